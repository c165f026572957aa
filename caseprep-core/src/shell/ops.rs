// caseprep-core/src/shell/ops.rs
use std::path::Path;

use caseprep_common::error::{CaseprepError, Result};
use tracing::{debug, info};

use crate::exec::{powershell_args, ps_quote, CommandRunner, POWERSHELL};

/// Exit code the pin script uses when the OS build exposes no pin verb.
/// Mapped to `UnsupportedShellOperation`, which is benign for the run.
const PIN_VERB_MISSING_EXIT: i32 = 3;

const ELEVATION_QUERY: &str = "([Security.Principal.WindowsPrincipal]\
[Security.Principal.WindowsIdentity]::GetCurrent())\
.IsInRole([Security.Principal.WindowsBuiltInRole]::Administrator)";

/// Asks PowerShell whether the current process token carries administrator
/// rights. Package installs and persistent shell mutation both need an
/// elevated token, so the orchestrator gates the whole run on this. A host
/// that cannot even spawn PowerShell surfaces the spawn error.
pub fn is_elevated(runner: &dyn CommandRunner) -> Result<bool> {
    let out = runner.run(POWERSHELL, &powershell_args(ELEVATION_QUERY))?;
    if !out.success() {
        return Err(CaseprepError::CommandExec(format!(
            "elevation query failed with exit {:?}: {}",
            out.exit_code,
            out.stderr.trim()
        )));
    }
    Ok(out.stdout.trim().eq_ignore_ascii_case("true"))
}

/// Creates (or overwrites) a `.lnk` shortcut in `shortcut_dir` pointing at
/// `target`. Overwriting makes re-runs idempotent.
pub fn create_shortcut(
    runner: &dyn CommandRunner,
    target: &Path,
    shortcut_dir: &Path,
    working_dir: Option<&Path>,
) -> Result<()> {
    let stem = target
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            CaseprepError::ValidationError(format!(
                "shortcut target has no file name: {}",
                target.display()
            ))
        })?;
    let link_path = shortcut_dir.join(format!("{stem}.lnk"));

    let work = working_dir
        .map(|p| p.display().to_string())
        .or_else(|| target.parent().map(|p| p.display().to_string()))
        .unwrap_or_default();

    let cmd = format!(
        "$ws = New-Object -ComObject WScript.Shell; \
         $s = $ws.CreateShortcut('{link}'); \
         $s.TargetPath = '{target}'; \
         $s.WorkingDirectory = '{work}'; \
         $s.Save()",
        link = ps_quote(&link_path.display().to_string()),
        target = ps_quote(&target.display().to_string()),
        work = ps_quote(&work),
    );
    let out = runner.run(POWERSHELL, &powershell_args(&cmd))?;
    if !out.success() {
        return Err(CaseprepError::CommandExec(format!(
            "creating shortcut for {} failed: {}",
            target.display(),
            out.stderr.trim()
        )));
    }
    info!("Shortcut created: {}", link_path.display());
    Ok(())
}

/// Pins `target` to the taskbar via the shell pin verb. Best effort: when
/// the host exposes no pin verb (varies by OS build) this returns
/// `UnsupportedShellOperation` rather than a hard failure.
pub fn pin_to_taskbar(runner: &dyn CommandRunner, target: &Path) -> Result<()> {
    let (dir, name) = match (target.parent(), target.file_name().and_then(|n| n.to_str())) {
        (Some(dir), Some(name)) => (dir, name),
        _ => {
            return Err(CaseprepError::ValidationError(format!(
                "cannot pin path without a parent directory: {}",
                target.display()
            )))
        }
    };

    let cmd = format!(
        "$shell = New-Object -ComObject Shell.Application; \
         $folder = $shell.Namespace('{dir}'); \
         $item = $folder.ParseName('{name}'); \
         $verb = $item.Verbs() | Where-Object {{ ($_.Name -replace '&','') -match 'Pin to taskbar' }}; \
         if ($null -eq $verb) {{ exit {missing} }}; \
         $verb.DoIt()",
        dir = ps_quote(&dir.display().to_string()),
        name = ps_quote(name),
        missing = PIN_VERB_MISSING_EXIT,
    );
    let out = runner.run(POWERSHELL, &powershell_args(&cmd))?;
    match out.exit_code {
        Some(0) => {
            info!("Pinned {} to taskbar", target.display());
            Ok(())
        }
        Some(PIN_VERB_MISSING_EXIT) => Err(CaseprepError::UnsupportedShellOperation(format!(
            "no taskbar pin verb available for {}",
            target.display()
        ))),
        code => Err(CaseprepError::CommandExec(format!(
            "pinning {} failed with exit {:?}: {}",
            target.display(),
            code,
            out.stderr.trim()
        ))),
    }
}

/// Writes one registry value, creating the key when absent.
pub fn set_registry_value(
    runner: &dyn CommandRunner,
    key: &str,
    name: &str,
    value: &str,
) -> Result<()> {
    debug!("Setting registry value {key}\\{name}");
    let cmd = format!(
        "New-Item -Path '{key}' -Force | Out-Null; \
         Set-ItemProperty -Path '{key}' -Name '{name}' -Value '{value}'",
        key = ps_quote(key),
        name = ps_quote(name),
        value = ps_quote(value),
    );
    let out = runner.run(POWERSHELL, &powershell_args(&cmd))?;
    if !out.success() {
        return Err(CaseprepError::CommandExec(format!(
            "setting registry value {key}\\{name} failed: {}",
            out.stderr.trim()
        )));
    }
    Ok(())
}
