// caseprep-core/src/installer/choco.rs
//! Chocolatey package backend.

use caseprep_common::error::{CaseprepError, Result};
use tracing::{debug, info, warn};

use super::{BackendOutcome, InstallContext};
use crate::exec::CommandRunner;

const CHOCO: &str = "choco";

// Chocolatey signals a completed install that still needs a reboot with
// these MSI-style exit codes. Treated as success-with-caveat.
const REBOOT_REQUIRED_EXIT_CODES: [i32; 2] = [1641, 3010];

/// Whether the Chocolatey CLI itself is available on this host.
pub fn detect(runner: &dyn CommandRunner) -> bool {
    runner
        .run(CHOCO, &["--version".to_string()])
        .map(|out| out.success())
        .unwrap_or(false)
}

/// Whether `package` is registered as installed by Chocolatey.
/// `--limit-output` gives parseable `name|version` lines.
pub fn is_installed(runner: &dyn CommandRunner, package: &str) -> Result<bool> {
    let args: Vec<String> = vec![
        "list".into(),
        "--exact".into(),
        "--limit-output".into(),
        package.into(),
    ];
    let out = runner.run(CHOCO, &args)?;
    if !out.success() {
        return Err(CaseprepError::CommandExec(format!(
            "choco list for '{package}' failed with exit {:?}: {}",
            out.exit_code,
            out.stderr.trim()
        )));
    }
    Ok(out.stdout.lines().any(|line| {
        line.split('|')
            .next()
            .is_some_and(|name| name.eq_ignore_ascii_case(package))
    }))
}

pub(crate) fn install(
    ctx: &InstallContext,
    package: &str,
    version: Option<&str>,
    tool_name: &str,
) -> Result<BackendOutcome> {
    let runner = ctx.runner.as_ref();

    if !ctx.force_reinstall && is_installed(runner, package)? {
        debug!("Package '{}' already registered with Chocolatey", package);
        return Ok(BackendOutcome::AlreadyInstalled);
    }

    info!("Installing {} via Chocolatey...", tool_name);
    let mut args: Vec<String> = vec![
        "install".into(),
        package.into(),
        "-y".into(),
        "--no-progress".into(),
    ];
    if let Some(v) = version {
        args.push("--version".into());
        args.push(v.into());
    }
    if ctx.force_reinstall {
        args.push("--force".into());
    }

    let out = runner.run(CHOCO, &args)?;
    match out.exit_code {
        Some(0) => {}
        Some(code) if REBOOT_REQUIRED_EXIT_CODES.contains(&code) => {
            warn!(
                "{} installed, but Chocolatey reports a reboot is required (exit {})",
                tool_name, code
            );
        }
        code => {
            return Err(CaseprepError::InstallError(format!(
                "choco install {package} exited with {code:?}: {}",
                out.excerpt().unwrap_or_default()
            )));
        }
    }

    // Re-verify after a reported success. The manager has been observed to
    // report success without the package actually registering.
    if !is_installed(runner, package)? {
        return Err(CaseprepError::InstallError(format!(
            "choco reported success but '{package}' is not registered as installed"
        )));
    }

    Ok(BackendOutcome::Installed {
        excerpt: out.excerpt(),
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use caseprep_common::config::Config;

    use super::*;
    use crate::exec::testing::ScriptedRunner;
    use crate::shell::path::testing::MemoryEnvStore;

    fn test_config() -> Config {
        Config {
            root: PathBuf::from("/tmp/caseprep-test"),
            catalog_path: PathBuf::from("/tmp/caseprep-test/tools.json"),
            download_max_attempts: 3,
            download_backoff_secs: 0,
        }
    }

    pub(crate) fn context_with(runner: ScriptedRunner, force_reinstall: bool) -> InstallContext {
        InstallContext {
            config: test_config(),
            force_reinstall,
            runner: Arc::new(runner),
            env: Arc::new(MemoryEnvStore::default()),
            http: reqwest::Client::new(),
        }
    }

    #[test]
    fn fresh_install_then_rerun_skips() {
        // First run: not listed, install ok, re-verify lists it.
        let runner = ScriptedRunner::new(vec![
            ScriptedRunner::ok(0, ""),
            ScriptedRunner::ok(0, "Installing foo... done"),
            ScriptedRunner::ok(0, "foo|1.2.3"),
        ]);
        let ctx = context_with(runner, false);
        let outcome = install(&ctx, "foo", None, "Foo").unwrap();
        assert!(matches!(outcome, BackendOutcome::Installed { .. }));

        // Second run: already listed.
        let runner = ScriptedRunner::new(vec![ScriptedRunner::ok(0, "foo|1.2.3")]);
        let ctx = context_with(runner, false);
        let outcome = install(&ctx, "foo", None, "Foo").unwrap();
        assert!(matches!(outcome, BackendOutcome::AlreadyInstalled));
    }

    #[test]
    fn force_reinstall_bypasses_the_idempotency_check() {
        let runner = ScriptedRunner::new(vec![
            ScriptedRunner::ok(0, "done"),
            ScriptedRunner::ok(0, "foo|1.2.3"),
        ]);
        let ctx = context_with(runner, true);
        let outcome = install(&ctx, "foo", None, "Foo").unwrap();
        assert!(matches!(outcome, BackendOutcome::Installed { .. }));
    }

    #[test]
    fn force_reinstall_passes_force_flag() {
        let runner = Arc::new(ScriptedRunner::new(vec![
            ScriptedRunner::ok(0, "done"),
            ScriptedRunner::ok(0, "foo|1.2.3"),
        ]));
        let ctx = InstallContext {
            runner: runner.clone(),
            ..context_with(ScriptedRunner::default(), true)
        };
        install(&ctx, "foo", None, "Foo").unwrap();
        let calls = runner.calls.lock().unwrap();
        assert!(calls[0].1.contains(&"--force".to_string()));
    }

    #[test]
    fn reboot_required_exit_code_is_success() {
        let runner = ScriptedRunner::new(vec![
            ScriptedRunner::ok(0, ""),
            ScriptedRunner::ok(3010, "reboot required"),
            ScriptedRunner::ok(0, "foo|1.2.3"),
        ]);
        let ctx = context_with(runner, false);
        assert!(matches!(
            install(&ctx, "foo", None, "Foo").unwrap(),
            BackendOutcome::Installed { .. }
        ));
    }

    #[test]
    fn lying_manager_is_caught_by_reverification() {
        // Install exits 0 but the follow-up list query does not show it.
        let runner = ScriptedRunner::new(vec![
            ScriptedRunner::ok(0, ""),
            ScriptedRunner::ok(0, "ok"),
            ScriptedRunner::ok(0, ""),
        ]);
        let ctx = context_with(runner, false);
        let err = install(&ctx, "foo", None, "Foo").unwrap_err();
        assert!(matches!(err, CaseprepError::InstallError(_)));
        assert!(err.to_string().contains("not registered"));
    }

    #[test]
    fn nonzero_install_exit_is_a_failure() {
        let runner = ScriptedRunner::new(vec![
            ScriptedRunner::ok(0, ""),
            ScriptedRunner::err("package not found"),
        ]);
        let ctx = context_with(runner, false);
        let err = install(&ctx, "foo", None, "Foo").unwrap_err();
        assert!(err.to_string().contains("package not found"));
    }

    #[test]
    fn version_pin_is_forwarded() {
        let runner = Arc::new(ScriptedRunner::new(vec![
            ScriptedRunner::ok(0, ""),
            ScriptedRunner::ok(0, "done"),
            ScriptedRunner::ok(0, "foo|2.0.0"),
        ]));
        let ctx = InstallContext {
            runner: runner.clone(),
            ..context_with(ScriptedRunner::default(), false)
        };
        install(&ctx, "foo", Some("2.0.0"), "Foo").unwrap();
        let calls = runner.calls.lock().unwrap();
        let install_args = &calls[1].1;
        let idx = install_args.iter().position(|a| a == "--version").unwrap();
        assert_eq!(install_args[idx + 1], "2.0.0");
    }

    #[test]
    fn detect_is_false_when_choco_cannot_spawn() {
        let runner = ScriptedRunner::new(vec![ScriptedRunner::spawn_failure("not found")]);
        assert!(!detect(&runner));
        let runner = ScriptedRunner::new(vec![ScriptedRunner::ok(0, "2.2.2")]);
        assert!(detect(&runner));
    }

    #[test]
    fn matching_is_exact_name_case_insensitive() {
        let runner = ScriptedRunner::new(vec![ScriptedRunner::ok(0, "Foo|1.0\nfoobar|2.0")]);
        assert!(is_installed(&runner, "foo").unwrap());
        let runner = ScriptedRunner::new(vec![ScriptedRunner::ok(0, "foobar|2.0")]);
        assert!(!is_installed(&runner, "foo").unwrap());
    }
}
