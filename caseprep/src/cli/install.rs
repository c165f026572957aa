// caseprep/src/cli/install.rs
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use caseprep_common::catalog::Catalog;
use caseprep_common::config::Config;
use caseprep_common::error::{CaseprepError, Result};
use caseprep_core::{Orchestrator, RunFlags, RunPlan, RunResult};
use clap::Args;
use colored::Colorize;
use dialoguer::MultiSelect;
use prettytable::{format, Cell, Row, Table};
use tracing::{debug, instrument, warn};

use crate::cli::status::ConsoleSink;

#[derive(Debug, Args)]
pub struct InstallArgs {
    /// Tool ids to install; with no ids the catalog defaults are offered
    names: Vec<String>,

    /// Use an alternate catalog file
    #[arg(long, value_name = "FILE")]
    catalog: Option<PathBuf>,

    /// Select every tool in the catalog
    #[arg(long)]
    all: bool,

    /// Install exactly these tool ids, ignoring defaults
    #[arg(long, value_name = "ID", conflicts_with = "all")]
    only: Vec<String>,

    /// Tool ids to drop from the selection
    #[arg(long, value_name = "ID")]
    skip: Vec<String>,

    /// Accept the computed selection without prompting
    #[arg(short = 'y', long)]
    yes: bool,

    /// Report what would be done without touching the host
    #[arg(long)]
    dry_run: bool,

    /// Reinstall tools that are already present
    #[arg(long)]
    force_reinstall: bool,
}

impl InstallArgs {
    #[instrument(skip(self, config), fields(targets = ?self.names))]
    pub async fn run(&self, config: &Config) -> Result<i32> {
        if self.all && !self.names.is_empty() {
            return Err(CaseprepError::Generic(
                "Cannot combine --all with explicit tool ids.".to_string(),
            ));
        }

        let catalog_path = self
            .catalog
            .clone()
            .unwrap_or_else(|| config.catalog_path.clone());
        debug!("Loading catalog from {}", catalog_path.display());
        let catalog = Catalog::load(&catalog_path)?;

        let selected = self.select(&catalog)?;
        if selected.is_empty() {
            println!("{}", "Nothing selected; nothing to do.".yellow());
            return Ok(0);
        }

        let flags = RunFlags {
            dry_run: self.dry_run,
            force_reinstall: self.force_reinstall,
        };
        let plan = RunPlan::build(&catalog, &selected, flags)?;
        if plan.is_empty() {
            println!("{}", "No selected tool exists in the catalog.".yellow());
            return Ok(0);
        }

        let sink = Arc::new(ConsoleSink::new());
        let orchestrator = Orchestrator::new(config.clone(), sink)?;

        let cancel = orchestrator.cancel_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; stopping after the current tool.");
                cancel.store(true, Ordering::SeqCst);
            }
        });

        let result = orchestrator.run(&plan).await;
        if !result.outcomes.is_empty() {
            print_summary(&result);
        }
        Ok(result.status.exit_code())
    }

    /// Resolves the tool selection: explicit ids, --all, catalog defaults,
    /// or an interactive picker when attached to a terminal. --skip is
    /// applied last in every mode.
    fn select(&self, catalog: &Catalog) -> Result<Vec<String>> {
        let mut selected: Vec<String> = if !self.only.is_empty() {
            self.only.clone()
        } else if self.all {
            catalog.tool_ids()
        } else if !self.names.is_empty() {
            self.names.clone()
        } else if self.yes || !std::io::stdin().is_terminal() {
            catalog.default_tool_ids()
        } else {
            self.prompt(catalog)?
        };

        selected.retain(|id| !self.skip.iter().any(|s| s == id));
        Ok(selected)
    }

    fn prompt(&self, catalog: &Catalog) -> Result<Vec<String>> {
        let tools: Vec<_> = catalog.tools().collect();
        let labels: Vec<String> = tools
            .iter()
            .map(|t| format!("{} ({})", t.name, t.id))
            .collect();
        let defaults: Vec<bool> = tools.iter().map(|t| t.default).collect();

        let picked = MultiSelect::new()
            .with_prompt("Select tools to install")
            .items(&labels)
            .defaults(&defaults)
            .interact()
            .map_err(|e| CaseprepError::Generic(format!("Selection prompt failed: {e}")))?;

        Ok(picked.into_iter().map(|i| tools[i].id.clone()).collect())
    }
}

fn print_summary(result: &RunResult) {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.add_row(Row::new(vec![
        Cell::new("Tool").style_spec("b"),
        Cell::new("Result").style_spec("b"),
        Cell::new("Time").style_spec("b"),
    ]));
    for outcome in &result.outcomes {
        let label = match &outcome.status {
            s if s.is_failed() => s.label().red().bold().to_string(),
            caseprep_common::pipeline::OutcomeStatus::Success => {
                outcome.status.label().green().to_string()
            }
            _ => outcome.status.label().dimmed().to_string(),
        };
        table.add_row(Row::new(vec![
            Cell::new(&outcome.tool_id),
            Cell::new(&label),
            Cell::new(&format!("{:.1}s", outcome.duration.as_secs_f64())),
        ]));
    }
    table.printstd();
}
