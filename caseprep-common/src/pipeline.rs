// caseprep-common/src/pipeline.rs
//! Shared types flowing between the orchestrator and its reporting sinks.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    AlreadyInstalled,
    DryRun,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeStatus {
    Success,
    Skipped(SkipReason),
    Failed(String),
}

impl OutcomeStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, OutcomeStatus::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            OutcomeStatus::Success => "success",
            OutcomeStatus::Skipped(SkipReason::AlreadyInstalled) => "already installed",
            OutcomeStatus::Skipped(SkipReason::DryRun) => "dry-run",
            OutcomeStatus::Failed(_) => "failed",
        }
    }
}

/// Produced once per attempted tool; never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallOutcome {
    pub tool_id: String,
    pub status: OutcomeStatus,
    pub duration: Duration,
    /// Tail of the backend's output, kept for diagnosis without a re-run.
    pub log_excerpt: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Success,
    PartialFailure,
    Failed,
}

impl RunStatus {
    /// Process exit code the CLI surfaces for this status.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Failed => 1,
            RunStatus::PartialFailure => 2,
        }
    }
}

/// Ordered progress events emitted while a run executes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReportEvent {
    RunStarted {
        total: usize,
        dry_run: bool,
    },
    BootstrapStarted {
        name: String,
    },
    BootstrapFinished {
        name: String,
        success: bool,
    },
    ToolStarted {
        index: usize,
        total: usize,
        tool_id: String,
        name: String,
    },
    ToolFinished {
        index: usize,
        total: usize,
        tool_id: String,
        status: OutcomeStatus,
    },
    PostInstallAction {
        tool_id: String,
        description: String,
    },
    RunFinished {
        status: RunStatus,
        success_count: usize,
        skipped_count: usize,
        fail_count: usize,
        duration: Duration,
    },
}

impl ReportEvent {
    /// Completed/total expressed as a whole percentage, when the event
    /// carries progress information.
    pub fn progress_percent(&self) -> Option<u8> {
        match self {
            ReportEvent::ToolStarted { index, total, .. } => {
                // Indices are 1-based; saturate so a zero index cannot wrap.
                Some(((index.saturating_sub(1) * 100) / (*total).max(1)) as u8)
            }
            ReportEvent::ToolFinished { index, total, .. } => {
                Some(((index * 100) / (*total).max(1)) as u8)
            }
            ReportEvent::RunFinished { .. } => Some(100),
            _ => None,
        }
    }
}

/// Receives ordered progress events. Implementations must render events in
/// the order received and must not block the orchestrator; a sink that
/// fails to render must never abort an installation.
pub trait ProgressSink: Send + Sync {
    fn handle(&self, event: ReportEvent);
}

/// Sink that drops every event. Used by callers that only want the
/// aggregated `RunResult`, and by tests.
#[derive(Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn handle(&self, _event: ReportEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_percent_moves_with_tool_index() {
        let started = ReportEvent::ToolStarted {
            index: 1,
            total: 4,
            tool_id: "a".into(),
            name: "A".into(),
        };
        let finished = ReportEvent::ToolFinished {
            index: 4,
            total: 4,
            tool_id: "d".into(),
            status: OutcomeStatus::Success,
        };
        assert_eq!(started.progress_percent(), Some(0));
        assert_eq!(finished.progress_percent(), Some(100));
    }

    #[test]
    fn progress_percent_tolerates_a_zero_index() {
        let started = ReportEvent::ToolStarted {
            index: 0,
            total: 4,
            tool_id: "a".into(),
            name: "A".into(),
        };
        assert_eq!(started.progress_percent(), Some(0));
    }

    #[test]
    fn exit_codes_are_nonzero_for_any_failure() {
        assert_eq!(RunStatus::Success.exit_code(), 0);
        assert_ne!(RunStatus::PartialFailure.exit_code(), 0);
        assert_ne!(RunStatus::Failed.exit_code(), 0);
    }
}
