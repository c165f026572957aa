// caseprep/src/cli/status.rs
//! Console rendering of orchestrator progress events.
use std::time::Duration;

use caseprep_common::pipeline::{OutcomeStatus, ProgressSink, ReportEvent, RunStatus, SkipReason};
use colored::*;

fn status_indicator(status: &OutcomeStatus) -> String {
    match status {
        OutcomeStatus::Success => " ✓".green().bold().to_string(),
        OutcomeStatus::Skipped(_) => " ·".dimmed().to_string(),
        OutcomeStatus::Failed(_) => " ✗".red().bold().to_string(),
    }
}

fn colored_label(status: &OutcomeStatus) -> ColoredString {
    match status {
        OutcomeStatus::Success => status.label().green().bold(),
        OutcomeStatus::Skipped(SkipReason::AlreadyInstalled) => status.label().cyan(),
        OutcomeStatus::Skipped(SkipReason::DryRun) => status.label().dimmed(),
        OutcomeStatus::Failed(_) => status.label().red().bold(),
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs >= 60.0 {
        format!("{}m {:.0}s", (secs / 60.0) as u64, secs % 60.0)
    } else {
        format!("{secs:.1}s")
    }
}

/// Renders events sequentially. Runs are strictly one tool at a time, so
/// plain line output is enough; there is no redraw or slot tracking.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }
}

impl ProgressSink for ConsoleSink {
    fn handle(&self, event: ReportEvent) {
        match event {
            ReportEvent::RunStarted { total, dry_run } => {
                if dry_run {
                    println!(
                        "{} {} tools selected",
                        "Dry-run:".yellow().bold(),
                        total
                    );
                } else {
                    println!("{} {} tools selected", "Installing:".bold(), total);
                }
            }
            ReportEvent::BootstrapStarted { name } => {
                println!("{} {}...", " ⚙".blue(), name);
            }
            ReportEvent::BootstrapFinished { name, success } => {
                if success {
                    println!("{} {}", " ✓".green().bold(), name);
                } else {
                    println!("{} {} {}", " ✗".red().bold(), name, "failed".red().bold());
                }
            }
            ReportEvent::ToolStarted {
                index, total, name, ..
            } => {
                println!("{} {}", format!("[{index}/{total}]").bold(), name);
            }
            ReportEvent::ToolFinished { status, .. } => {
                match &status {
                    OutcomeStatus::Failed(reason) => {
                        println!(
                            "{} {} {}",
                            status_indicator(&status),
                            colored_label(&status),
                            reason.dimmed()
                        );
                    }
                    _ => {
                        println!("{} {}", status_indicator(&status), colored_label(&status));
                    }
                }
            }
            ReportEvent::PostInstallAction { description, .. } => {
                println!("   {} {}", "→".cyan(), description.dimmed());
            }
            ReportEvent::RunFinished {
                status,
                success_count,
                skipped_count,
                fail_count,
                duration,
            } => {
                let verdict = match status {
                    RunStatus::Success => "Completed".green().bold(),
                    RunStatus::PartialFailure => "Completed with failures".yellow().bold(),
                    RunStatus::Failed => "Failed".red().bold(),
                };
                println!(
                    "{} in {}: {} succeeded, {} skipped, {} failed",
                    verdict,
                    format_duration(duration),
                    success_count,
                    skipped_count,
                    fail_count
                );
            }
        }
    }
}
