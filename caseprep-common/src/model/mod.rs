// caseprep-common/src/model/mod.rs
pub mod action;
pub mod tool;
pub use action::{PathScope, PostInstallAction};
pub use tool::{InstallerSpec, ToolSpec};
