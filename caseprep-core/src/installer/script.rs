// caseprep-core/src/installer/script.rs
//! External PowerShell installer scripts. Each script is dot-sourced and
//! its entry-point function invoked with the spec's arguments; the script
//! performs its own sub-steps (download, extract, locate executable).

use std::path::{Path, PathBuf};

use caseprep_common::error::{CaseprepError, Result};
use tracing::info;

use super::{BackendOutcome, InstallContext};
use crate::exec::{powershell_args, ps_quote, POWERSHELL};

pub(crate) fn install(
    ctx: &InstallContext,
    script: &Path,
    function: &str,
    args: Option<&str>,
    tool_name: &str,
) -> Result<BackendOutcome> {
    let script_path = resolve_script(ctx, script);
    if !script_path.is_file() {
        return Err(CaseprepError::InstallError(format!(
            "installer script not found: {}",
            script_path.display()
        )));
    }

    info!("Installing {}...", tool_name);
    let call = format!(
        ". '{}'; {} {}",
        ps_quote(&script_path.display().to_string()),
        function,
        args.unwrap_or_default()
    );
    let out = ctx.runner.run(POWERSHELL, &powershell_args(call.trim()))?;

    if !out.success() {
        return Err(CaseprepError::InstallError(format!(
            "{function} returned {:?}: {}",
            out.exit_code,
            out.excerpt().unwrap_or_default()
        )));
    }
    Ok(BackendOutcome::Installed {
        excerpt: out.excerpt(),
    })
}

/// Absolute paths are honored; anything else resolves against the
/// installers directory under the configured root.
fn resolve_script(ctx: &InstallContext, script: &Path) -> PathBuf {
    if script.is_absolute() {
        script.to_path_buf()
    } else {
        ctx.config.scripts_dir().join(script)
    }
}
