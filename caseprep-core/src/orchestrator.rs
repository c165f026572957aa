// caseprep-core/src/orchestrator.rs
//! The control-flow core: resolves the selected subset of the catalog,
//! executes each tool's backend strictly in catalog order, applies the
//! continue-on-error policy at a single boundary, and aggregates outcomes.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use caseprep_common::catalog::Catalog;
use caseprep_common::config::Config;
use caseprep_common::error::{CaseprepError, Result};
use caseprep_common::model::{InstallerSpec, PostInstallAction, ToolSpec};
use caseprep_common::pipeline::{
    InstallOutcome, OutcomeStatus, ProgressSink, ReportEvent, RunStatus, SkipReason,
};
use tracing::{debug, error, info, warn};

use crate::exec::{CommandRunner, SystemRunner};
use crate::installer::{self, builtin, choco, InstallContext};
use crate::shell::{self, EnvStore, PowershellEnvStore};

const BOOTSTRAP_STEP_NAME: &str = "Ensure Chocolatey";

/// Global flags for one invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunFlags {
    pub dry_run: bool,
    pub force_reinstall: bool,
}

/// The resolved, ordered list of tools selected for one invocation.
/// Immutable for the run's duration.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub tools: Vec<ToolSpec>,
    pub flags: RunFlags,
}

impl RunPlan {
    /// Intersects the user selection with the catalog, preserving catalog
    /// order. Selected ids missing from the catalog are logged and
    /// dropped; a tool referencing an unknown builtin routine is rejected
    /// here, before anything executes.
    pub fn build(catalog: &Catalog, selected: &[String], flags: RunFlags) -> Result<RunPlan> {
        let selected_set: HashSet<&str> = selected.iter().map(String::as_str).collect();
        for id in selected {
            if catalog.get(id).is_none() {
                warn!("Tool not found in catalog: {}", id);
            }
        }

        let tools: Vec<ToolSpec> = catalog
            .tools()
            .filter(|t| selected_set.contains(t.id.as_str()))
            .cloned()
            .collect();

        for tool in &tools {
            if let InstallerSpec::Builtin { function, .. } = &tool.installer {
                if !builtin::registry().contains(function) {
                    return Err(CaseprepError::MalformedCatalog(format!(
                        "tool '{}' references unknown builtin function '{}'",
                        tool.id, function
                    )));
                }
            }
        }

        Ok(RunPlan { tools, flags })
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    fn needs_chocolatey(&self) -> bool {
        self.tools
            .iter()
            .any(|t| matches!(t.installer, InstallerSpec::Chocolatey { .. }))
    }
}

/// Aggregate of all outcomes plus the overall status. Read by the caller
/// after the run completes.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub outcomes: Vec<InstallOutcome>,
    pub status: RunStatus,
    pub duration: Duration,
}

impl RunResult {
    pub fn success_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, OutcomeStatus::Success))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, OutcomeStatus::Skipped(_)))
            .count()
    }

    pub fn fail_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status.is_failed()).count()
    }
}

pub struct Orchestrator {
    config: Config,
    runner: Arc<dyn CommandRunner>,
    env: Arc<dyn EnvStore>,
    sink: Arc<dyn ProgressSink>,
    http: reqwest::Client,
    cancel: Arc<AtomicBool>,
}

impl Orchestrator {
    /// Production wiring: real process runner, PowerShell-backed
    /// environment store, shared HTTP client.
    pub fn new(config: Config, sink: Arc<dyn ProgressSink>) -> Result<Self> {
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
        let env: Arc<dyn EnvStore> = Arc::new(PowershellEnvStore::new(runner.clone()));
        let http = caseprep_net::build_http_client()?;
        Ok(Self::with_parts(config, runner, env, sink, http))
    }

    pub fn with_parts(
        config: Config,
        runner: Arc<dyn CommandRunner>,
        env: Arc<dyn EnvStore>,
        sink: Arc<dyn ProgressSink>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            config,
            runner,
            env,
            sink,
            http,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Token a caller can set to stop the run. Honored between tools only:
    /// a backend that has started runs to completion.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub async fn run(&self, plan: &RunPlan) -> RunResult {
        let start = Instant::now();
        let total = plan.tools.len();
        debug!("Run planned: {} tools, dry_run={}", total, plan.flags.dry_run);
        self.sink.handle(ReportEvent::RunStarted {
            total,
            dry_run: plan.flags.dry_run,
        });

        let ctx = self.context(plan);

        // Prerequisite failures are the one fatal case: nothing is
        // attempted on an unelevated host or when the package manager
        // cannot be provisioned.
        if let Err(e) = self.ensure_prerequisites(plan, &ctx).await {
            error!("Prerequisite check failed, aborting run: {}", e);
            let result = RunResult {
                outcomes: Vec::new(),
                status: RunStatus::Failed,
                duration: start.elapsed(),
            };
            self.emit_finished(&result);
            return result;
        }

        let mut outcomes: Vec<InstallOutcome> = Vec::with_capacity(total);
        for (i, tool) in plan.tools.iter().enumerate() {
            let index = i + 1;
            if self.cancel.load(Ordering::SeqCst) {
                warn!("Cancelled by user before next step.");
                break;
            }

            self.sink.handle(ReportEvent::ToolStarted {
                index,
                total,
                tool_id: tool.id.clone(),
                name: tool.name.clone(),
            });
            info!("[{}/{}] {}...", index, total, tool.name);

            let outcome = if plan.flags.dry_run {
                self.dry_run_outcome(tool)
            } else {
                let mut outcome = installer::install(tool, &ctx).await;
                if !outcome.status.is_failed() {
                    self.apply_post_install(tool, &ctx, &mut outcome);
                }
                outcome
            };

            self.sink.handle(ReportEvent::ToolFinished {
                index,
                total,
                tool_id: tool.id.clone(),
                status: outcome.status.clone(),
            });
            outcomes.push(outcome);
        }

        let status = compute_status(&outcomes);
        let result = RunResult {
            outcomes,
            status,
            duration: start.elapsed(),
        };
        self.emit_finished(&result);
        result
    }

    fn context(&self, plan: &RunPlan) -> InstallContext {
        InstallContext {
            config: self.config.clone(),
            force_reinstall: plan.flags.force_reinstall,
            runner: self.runner.clone(),
            env: self.env.clone(),
            http: self.http.clone(),
        }
    }

    /// Host gate plus the Chocolatey bootstrap. Every backend and shell
    /// mutation this engine performs needs an elevated token, so the
    /// elevation check runs for every plan; the bootstrap only when a
    /// Chocolatey tool is planned.
    async fn ensure_prerequisites(&self, plan: &RunPlan, ctx: &InstallContext) -> Result<()> {
        if plan.flags.dry_run {
            info!("dry-run: skipping host elevation check");
            if plan.needs_chocolatey() {
                info!("dry-run: would ensure Chocolatey is installed");
            }
            return Ok(());
        }

        if !shell::is_elevated(ctx.runner.as_ref())? {
            return Err(CaseprepError::PrerequisiteMissing(
                "administrator privileges are required; re-run from an elevated shell".into(),
            ));
        }
        debug!("Running with an elevated token");

        if !plan.needs_chocolatey() {
            return Ok(());
        }
        if choco::detect(ctx.runner.as_ref()) {
            debug!("Chocolatey already present");
            return Ok(());
        }

        self.sink.handle(ReportEvent::BootstrapStarted {
            name: BOOTSTRAP_STEP_NAME.to_string(),
        });
        info!("{}...", BOOTSTRAP_STEP_NAME);
        let result = builtin::registry()
            .run("ensure_chocolatey", ctx, &BTreeMap::new())
            .await;
        self.sink.handle(ReportEvent::BootstrapFinished {
            name: BOOTSTRAP_STEP_NAME.to_string(),
            success: result.is_ok(),
        });
        result
    }

    fn dry_run_outcome(&self, tool: &ToolSpec) -> InstallOutcome {
        let mut description = installer::describe(tool);
        for action in &tool.post_install {
            description.push_str("; would ");
            description.push_str(&action.describe());
        }
        info!("dry-run: {}", description);
        InstallOutcome {
            tool_id: tool.id.clone(),
            status: OutcomeStatus::Skipped(SkipReason::DryRun),
            duration: Duration::ZERO,
            log_excerpt: Some(description),
        }
    }

    fn apply_post_install(
        &self,
        tool: &ToolSpec,
        ctx: &InstallContext,
        outcome: &mut InstallOutcome,
    ) {
        for action in &tool.post_install {
            self.sink.handle(ReportEvent::PostInstallAction {
                tool_id: tool.id.clone(),
                description: action.describe(),
            });
            match self.apply_action(action, ctx) {
                Ok(()) => debug!("{}: {}", tool.id, action.describe()),
                Err(e) if e.is_benign() => {
                    warn!("{}: {} (continuing)", tool.id, e);
                }
                Err(e) => {
                    error!("{}: post-install action failed: {}", tool.id, e);
                    outcome.status = OutcomeStatus::Failed(format!(
                        "post-install '{}' failed: {e}",
                        action.describe()
                    ));
                    outcome.log_excerpt = Some(e.to_string());
                    return;
                }
            }
        }
    }

    fn apply_action(&self, action: &PostInstallAction, ctx: &InstallContext) -> Result<()> {
        match action {
            PostInstallAction::AddToPath { dir, scope } => {
                shell::add_to_path(ctx.env.as_ref(), dir, *scope).map(|_| ())
            }
            PostInstallAction::CreateShortcut {
                target,
                dir,
                working_dir,
            } => {
                let shortcut_dir = dir
                    .clone()
                    .unwrap_or_else(|| self.config.desktop_dir());
                shell::create_shortcut(
                    ctx.runner.as_ref(),
                    target,
                    &shortcut_dir,
                    working_dir.as_deref(),
                )
            }
            PostInstallAction::PinTaskbar { target } => {
                shell::pin_to_taskbar(ctx.runner.as_ref(), target)
            }
            PostInstallAction::SetRegistryValue { key, name, value } => {
                shell::set_registry_value(ctx.runner.as_ref(), key, name, value)
            }
        }
    }

    fn emit_finished(&self, result: &RunResult) {
        self.sink.handle(ReportEvent::RunFinished {
            status: result.status,
            success_count: result.success_count(),
            skipped_count: result.skipped_count(),
            fail_count: result.fail_count(),
            duration: result.duration,
        });
    }
}

/// `Success` when nothing failed (benign skips included); `Failed` when
/// everything that ran failed; `PartialFailure` otherwise.
fn compute_status(outcomes: &[InstallOutcome]) -> RunStatus {
    let failed = outcomes.iter().filter(|o| o.status.is_failed()).count();
    if failed == 0 {
        RunStatus::Success
    } else if failed == outcomes.len() {
        RunStatus::Failed
    } else {
        RunStatus::PartialFailure
    }
}
