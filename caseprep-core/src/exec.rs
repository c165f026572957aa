// caseprep-core/src/exec.rs
//! External process execution. Everything the engine runs on the host
//! (choco, powershell.exe, python) goes through the [`CommandRunner`]
//! trait so backends and shell integration can be exercised hermetically.

use std::process::Command;

use caseprep_common::error::{CaseprepError, Result};
use tracing::debug;

pub const POWERSHELL: &str = "powershell.exe";

const EXCERPT_MAX_CHARS: usize = 400;

#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Tail of the process output, preferring stderr, bounded so outcomes
    /// stay small enough to aggregate.
    pub fn excerpt(&self) -> Option<String> {
        let source = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return None;
        }
        let start = trimmed
            .char_indices()
            .rev()
            .nth(EXCERPT_MAX_CHARS - 1)
            .map(|(i, _)| i)
            .unwrap_or(0);
        Some(trimmed[start..].to_string())
    }
}

pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args` to completion, capturing output. A spawn
    /// failure is an error; a non-zero exit is a normal `ProcessOutput`.
    fn run(&self, program: &str, args: &[String]) -> Result<ProcessOutput>;
}

/// Production runner: spawns real processes synchronously. Installs run
/// one at a time, so blocking the invoking thread is intentional.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<ProcessOutput> {
        debug!("Executing: {} {}", program, args.join(" "));
        let output = Command::new(program).args(args).output().map_err(|e| {
            CaseprepError::CommandExec(format!("failed to spawn '{program}': {e}"))
        })?;
        Ok(ProcessOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Arguments for a non-interactive PowerShell invocation with stop-on-error
/// semantics, mirroring how the installer scripts expect to be driven.
pub fn powershell_args(inner: &str) -> Vec<String> {
    vec![
        "-NoProfile".to_string(),
        "-ExecutionPolicy".to_string(),
        "Bypass".to_string(),
        "-Command".to_string(),
        format!("$ErrorActionPreference='Stop'; {inner}"),
    ]
}

/// Escapes a value for inclusion inside single quotes in PowerShell.
pub fn ps_quote(value: &str) -> String {
    value.replace('`', "``").replace('\'', "''")
}
