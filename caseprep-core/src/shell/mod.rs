// caseprep-core/src/shell/mod.rs
//! Shell integration: persistent PATH edits, shortcuts, taskbar pinning,
//! registry values. All persistent-environment mutation in the engine
//! funnels through this module; the strictly sequential run model means a
//! single writer at a time, so read-then-conditionally-write is enough.

pub mod ops;
pub mod path;

pub use ops::{create_shortcut, is_elevated, pin_to_taskbar, set_registry_value};
pub use path::{add_to_path, EnvStore, PowershellEnvStore};
