// caseprep-core/src/lib.rs

// Top-level modules of the orchestration engine.
pub mod exec;
pub mod extract;
pub mod installer;
pub mod orchestrator;
pub mod shell;

// Re-export key types for the CLI crate.
pub use exec::{CommandRunner, ProcessOutput, SystemRunner};
pub use installer::InstallContext;
pub use orchestrator::{Orchestrator, RunFlags, RunPlan, RunResult};
