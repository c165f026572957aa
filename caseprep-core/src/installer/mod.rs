// caseprep-core/src/installer/mod.rs
//! Installer backends. Dispatch is a `match` over the three
//! [`InstallerSpec`] variants; the set of backends is deliberately closed.

pub mod builtin;
pub mod choco;
pub mod script;

use std::sync::Arc;
use std::time::Instant;

use caseprep_common::config::Config;
use caseprep_common::error::Result;
use caseprep_common::model::{InstallerSpec, ToolSpec};
use caseprep_common::pipeline::{InstallOutcome, OutcomeStatus, SkipReason};
use tracing::{error, info};

use crate::exec::CommandRunner;
use crate::shell::EnvStore;

/// Everything a backend needs to act on the host. The same utilities the
/// orchestrator uses are exposed here so in-process routines and external
/// scripts work against one environment.
pub struct InstallContext {
    pub config: Config,
    pub force_reinstall: bool,
    pub runner: Arc<dyn CommandRunner>,
    pub env: Arc<dyn EnvStore>,
    pub http: reqwest::Client,
}

/// What a backend reports back before the orchestrator wraps it into an
/// [`InstallOutcome`].
#[derive(Debug)]
pub(crate) enum BackendOutcome {
    Installed { excerpt: Option<String> },
    AlreadyInstalled,
}

/// Executes one tool's installer backend. Errors never escape: every
/// failure is folded into the returned outcome so the orchestrator's
/// continue-on-error policy has a single decision point.
pub async fn install(spec: &ToolSpec, ctx: &InstallContext) -> InstallOutcome {
    let start = Instant::now();
    let result = dispatch(spec, ctx).await;
    let duration = start.elapsed();

    match result {
        Ok(BackendOutcome::Installed { excerpt }) => {
            info!("{} installed.", spec.name);
            InstallOutcome {
                tool_id: spec.id.clone(),
                status: OutcomeStatus::Success,
                duration,
                log_excerpt: excerpt,
            }
        }
        Ok(BackendOutcome::AlreadyInstalled) => {
            info!("{} already present, skipping.", spec.name);
            InstallOutcome {
                tool_id: spec.id.clone(),
                status: OutcomeStatus::Skipped(SkipReason::AlreadyInstalled),
                duration,
                log_excerpt: None,
            }
        }
        Err(e) => {
            error!("{} failed: {}", spec.name, e);
            InstallOutcome {
                tool_id: spec.id.clone(),
                status: OutcomeStatus::Failed(e.to_string()),
                duration,
                log_excerpt: Some(e.to_string()),
            }
        }
    }
}

async fn dispatch(spec: &ToolSpec, ctx: &InstallContext) -> Result<BackendOutcome> {
    match &spec.installer {
        InstallerSpec::Chocolatey { package, version } => {
            choco::install(ctx, package, version.as_deref(), &spec.name)
        }
        InstallerSpec::PowershellScript {
            script,
            function,
            args,
        } => script::install(ctx, script, function, args.as_deref(), &spec.name),
        InstallerSpec::Builtin { function, args } => {
            builtin::registry().run(function, ctx, args).await?;
            Ok(BackendOutcome::Installed { excerpt: None })
        }
    }
}

/// Human-readable description of what executing this spec would do.
/// Dry-run replaces every backend call with this.
pub fn describe(spec: &ToolSpec) -> String {
    match &spec.installer {
        InstallerSpec::Chocolatey { package, version } => match version {
            Some(v) => format!("would install Chocolatey package '{package}' version {v}"),
            None => format!("would install Chocolatey package '{package}'"),
        },
        InstallerSpec::PowershellScript {
            script, function, ..
        } => format!(
            "would run PowerShell installer {} ({})",
            script.display(),
            function
        ),
        InstallerSpec::Builtin { function, .. } => {
            format!("would run builtin routine '{function}'")
        }
    }
}
