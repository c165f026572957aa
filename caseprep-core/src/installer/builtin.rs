// caseprep-core/src/installer/builtin.rs
//! In-process installer routines. The registry is fixed at process start;
//! catalog entries referencing an unknown id are rejected while the run
//! plan is built, not at execution time.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use caseprep_common::error::{CaseprepError, Result};
use caseprep_common::model::PathScope;
use caseprep_net::{download_with_retry, verify_checksum};
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{info, warn};
use walkdir::WalkDir;

use super::InstallContext;
use crate::exec::{powershell_args, POWERSHELL};
use crate::installer::choco;
use crate::shell;

const DEFAULT_PROBE_URLS: [&str; 2] = [
    "https://www.google.com/generate_204",
    "https://github.com",
];
const PROBE_TIMEOUT_SECS: u64 = 7;

const CHOCO_BOOTSTRAP: &str = "Set-ExecutionPolicy Bypass -Scope Process -Force; \
    [System.Net.ServicePointManager]::SecurityProtocol = \
    [System.Net.ServicePointManager]::SecurityProtocol -bor 3072; \
    iex ((New-Object System.Net.WebClient).DownloadString('https://community.chocolatey.org/install.ps1'))";

type BuiltinArgs = BTreeMap<String, String>;
type BuiltinFn = for<'a> fn(&'a InstallContext, &'a BuiltinArgs) -> BoxFuture<'a, Result<()>>;

pub struct BuiltinRegistry {
    map: HashMap<&'static str, BuiltinFn>,
}

impl BuiltinRegistry {
    fn with_entries(entries: &[(&'static str, BuiltinFn)]) -> Self {
        Self {
            map: entries.iter().copied().collect(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.map.contains_key(id)
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.map.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Runs the routine registered under `id`. A panic inside the routine
    /// is converted into an installation error.
    pub async fn run(&self, id: &str, ctx: &InstallContext, args: &BuiltinArgs) -> Result<()> {
        let f = self.map.get(id).ok_or_else(|| {
            CaseprepError::InstallError(format!("unknown builtin function '{id}'"))
        })?;
        match std::panic::AssertUnwindSafe(f(ctx, args)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(CaseprepError::InstallError(format!(
                "builtin '{id}' panicked: {}",
                panic_message(payload)
            ))),
        }
    }
}

fn panic_message(e: Box<dyn std::any::Any + Send>) -> String {
    match e.downcast_ref::<&'static str>() {
        Some(s) => (*s).to_string(),
        None => match e.downcast_ref::<String>() {
            Some(s) => s.clone(),
            None => "unknown panic payload".to_string(),
        },
    }
}

/// The process-wide registry of builtin routines.
pub fn registry() -> &'static BuiltinRegistry {
    static REGISTRY: OnceLock<BuiltinRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        BuiltinRegistry::with_entries(&[
            ("network_check", entry_network_check as BuiltinFn),
            ("ensure_chocolatey", entry_ensure_chocolatey as BuiltinFn),
            ("upgrade_pip", entry_upgrade_pip as BuiltinFn),
            ("fetch_archive", entry_fetch_archive as BuiltinFn),
        ])
    })
}

fn entry_network_check<'a>(ctx: &'a InstallContext, args: &'a BuiltinArgs) -> BoxFuture<'a, Result<()>> {
    network_check(ctx, args).boxed()
}
fn entry_ensure_chocolatey<'a>(ctx: &'a InstallContext, args: &'a BuiltinArgs) -> BoxFuture<'a, Result<()>> {
    ensure_chocolatey(ctx, args).boxed()
}
fn entry_upgrade_pip<'a>(ctx: &'a InstallContext, args: &'a BuiltinArgs) -> BoxFuture<'a, Result<()>> {
    upgrade_pip(ctx, args).boxed()
}
fn entry_fetch_archive<'a>(ctx: &'a InstallContext, args: &'a BuiltinArgs) -> BoxFuture<'a, Result<()>> {
    fetch_archive(ctx, args).boxed()
}

/// Probes a set of URLs and succeeds when at least one is reachable.
async fn network_check(ctx: &InstallContext, args: &BuiltinArgs) -> Result<()> {
    info!("Checking network connectivity...");
    let urls: Vec<String> = match args.get("urls") {
        Some(list) => list
            .split(',')
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .collect(),
        None => DEFAULT_PROBE_URLS.iter().map(|u| u.to_string()).collect(),
    };

    let mut reachable = 0usize;
    for url in &urls {
        let response = ctx
            .http
            .get(url)
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .send()
            .await;
        match response {
            Ok(resp) if resp.status().as_u16() < 400 => {
                info!("Reachable: {}", url);
                reachable += 1;
            }
            Ok(resp) => warn!("Unexpected status {} for {}", resp.status(), url),
            Err(e) => warn!("Not reachable: {} ({})", url, e),
        }
    }
    info!(
        "Network connectivity summary: {}/{} reachable",
        reachable,
        urls.len()
    );
    if reachable > 0 {
        Ok(())
    } else {
        Err(CaseprepError::InstallError(
            "no probe URL reachable".to_string(),
        ))
    }
}

/// Installs Chocolatey from the official bootstrap script when the CLI is
/// not already on the host. Doubles as the orchestrator's synthetic
/// bootstrap step.
async fn ensure_chocolatey(ctx: &InstallContext, _args: &BuiltinArgs) -> Result<()> {
    let runner = ctx.runner.as_ref();
    if choco::detect(runner) {
        info!("Chocolatey is ready.");
        return Ok(());
    }

    info!("Chocolatey not found, bootstrapping...");
    let out = runner.run(POWERSHELL, &powershell_args(CHOCO_BOOTSTRAP))?;
    if !out.success() {
        return Err(CaseprepError::PrerequisiteMissing(format!(
            "Chocolatey bootstrap exited with {:?}: {}",
            out.exit_code,
            out.excerpt().unwrap_or_default()
        )));
    }
    if !choco::detect(runner) {
        return Err(CaseprepError::PrerequisiteMissing(
            "choco is still unavailable after bootstrap".to_string(),
        ));
    }
    info!("Chocolatey is ready.");
    Ok(())
}

/// Upgrades pip and the core Python packaging tools. Non-zero exits are
/// tolerated (the workstation still works without them); only a spawn
/// failure is an error.
async fn upgrade_pip(ctx: &InstallContext, _args: &BuiltinArgs) -> Result<()> {
    info!("Upgrading pip and core tools...");
    let groups: [&[&str]; 2] = [&["pip", "setuptools", "wheel"], &["pipx", "virtualenv"]];
    for group in groups {
        let mut args: Vec<String> = vec!["-m".into(), "pip".into(), "install".into(), "-U".into()];
        args.extend(group.iter().map(|s| s.to_string()));
        let out = ctx.runner.run("python", &args)?;
        if !out.success() {
            warn!(
                "pip upgrade of {:?} returned {:?}: {}",
                group,
                out.exit_code,
                out.excerpt().unwrap_or_default()
            );
        }
    }
    Ok(())
}

/// Generic download-and-unpack routine: the in-process counterpart of the
/// one-off download-and-unzip installer scripts.
///
/// Args: `url` (required), `dest` (required; relative paths land under the
/// tools directory), `sha256`, `exe` (file name to locate after
/// extraction), `add_to_path` ("true"), `shortcut` ("true").
async fn fetch_archive(ctx: &InstallContext, args: &BuiltinArgs) -> Result<()> {
    let url = require_arg(args, "url")?;
    let dest_arg = require_arg(args, "dest")?;
    let dest = resolve_dest(ctx, dest_arg);

    let filename = url
        .split('/')
        .next_back()
        .filter(|s| !s.is_empty())
        .unwrap_or("download.zip");
    let archive_path = ctx.config.cache_dir().join(filename);

    download_with_retry(
        &ctx.http,
        url,
        &archive_path,
        ctx.config.download_max_attempts,
        Duration::from_secs(ctx.config.download_backoff_secs),
    )
    .await?;

    if let Some(expected) = args.get("sha256") {
        verify_checksum(&archive_path, expected)?;
    }

    crate::extract::extract_archive(&archive_path, &dest)?;
    info!("Extracted {} into {}", filename, dest.display());

    let mut bin_dir = dest.clone();
    if let Some(exe) = args.get("exe") {
        let exe_path = find_file(&dest, exe).ok_or_else(|| {
            CaseprepError::InstallError(format!(
                "'{exe}' not found under {} after extraction",
                dest.display()
            ))
        })?;
        bin_dir = exe_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| dest.clone());
        if flag(args, "shortcut") {
            shell::create_shortcut(
                ctx.runner.as_ref(),
                &exe_path,
                &ctx.config.desktop_dir(),
                None,
            )?;
        }
    }

    if flag(args, "add_to_path") {
        shell::add_to_path(ctx.env.as_ref(), &bin_dir, PathScope::User)?;
    }
    Ok(())
}

fn require_arg<'a>(args: &'a BuiltinArgs, key: &str) -> Result<&'a String> {
    args.get(key).ok_or_else(|| {
        CaseprepError::InstallError(format!("fetch_archive requires a '{key}' argument"))
    })
}

fn flag(args: &BuiltinArgs, key: &str) -> bool {
    args.get(key)
        .is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn resolve_dest(ctx: &InstallContext, dest: &str) -> PathBuf {
    let path = PathBuf::from(dest);
    if path.is_absolute() {
        path
    } else {
        ctx.config.tools_dir().join(path)
    }
}

fn find_file(root: &Path, name: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| {
            e.file_type().is_file()
                && e.file_name()
                    .to_str()
                    .is_some_and(|n| n.eq_ignore_ascii_case(name))
        })
        .map(|e| e.into_path())
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use caseprep_common::config::Config;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;
    use crate::exec::testing::ScriptedRunner;
    use crate::shell::path::testing::MemoryEnvStore;
    use crate::shell::path::EnvStore;

    fn context(root: &Path, runner: ScriptedRunner) -> (InstallContext, Arc<MemoryEnvStore>) {
        let env = Arc::new(MemoryEnvStore::default());
        let ctx = InstallContext {
            config: Config {
                root: root.to_path_buf(),
                catalog_path: root.join("tools.json"),
                download_max_attempts: 3,
                download_backoff_secs: 0,
            },
            force_reinstall: false,
            runner: Arc::new(runner),
            env: env.clone(),
            http: reqwest::Client::new(),
        };
        (ctx, env)
    }

    #[tokio::test]
    async fn unknown_builtin_id_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let (ctx, _) = context(tmp.path(), ScriptedRunner::default());
        let err = registry()
            .run("defragment_floppy", &ctx, &BuiltinArgs::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unknown builtin"));
    }

    #[test]
    fn standard_registry_contents() {
        let reg = registry();
        assert_eq!(
            reg.names(),
            vec![
                "ensure_chocolatey",
                "fetch_archive",
                "network_check",
                "upgrade_pip"
            ]
        );
        assert!(reg.contains("network_check"));
        assert!(!reg.contains("install_wallpaper"));
    }

    #[tokio::test]
    async fn panicking_builtin_becomes_an_install_error() {
        fn entry_boom<'a>(_: &'a InstallContext, _: &'a BuiltinArgs) -> BoxFuture<'a, Result<()>> {
            async { panic!("boom") }.boxed()
        }
        let reg = BuiltinRegistry::with_entries(&[("boom", entry_boom as BuiltinFn)]);
        let tmp = tempfile::tempdir().unwrap();
        let (ctx, _) = context(tmp.path(), ScriptedRunner::default());
        let err = reg.run("boom", &ctx, &BuiltinArgs::new()).await.unwrap_err();
        assert!(err.to_string().contains("panicked"));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn ensure_chocolatey_short_circuits_when_present() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(vec![ScriptedRunner::ok(0, "2.2.2")]));
        let (mut ctx, _) = context(tmp.path(), ScriptedRunner::default());
        ctx.runner = runner.clone();

        ensure_chocolatey(&ctx, &BuiltinArgs::new()).await.unwrap();
        assert_eq!(runner.call_count(), 1);
    }

    #[tokio::test]
    async fn ensure_chocolatey_bootstraps_then_reverifies() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(vec![
            ScriptedRunner::spawn_failure("choco not found"),
            ScriptedRunner::ok(0, "installed"),
            ScriptedRunner::ok(0, "2.2.2"),
        ]));
        let (mut ctx, _) = context(tmp.path(), ScriptedRunner::default());
        ctx.runner = runner.clone();

        ensure_chocolatey(&ctx, &BuiltinArgs::new()).await.unwrap();
        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].0, POWERSHELL);
    }

    #[tokio::test]
    async fn ensure_chocolatey_bootstrap_failure_is_prerequisite_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new(vec![
            ScriptedRunner::spawn_failure("choco not found"),
            ScriptedRunner::err("TLS handshake failed"),
        ]);
        let (mut ctx, _) = context(tmp.path(), ScriptedRunner::default());
        ctx.runner = Arc::new(runner);

        let err = ensure_chocolatey(&ctx, &BuiltinArgs::new()).await.unwrap_err();
        assert!(matches!(err, CaseprepError::PrerequisiteMissing(_)));
    }

    #[tokio::test]
    async fn fetch_archive_requires_url_and_dest() {
        let tmp = tempfile::tempdir().unwrap();
        let (ctx, _) = context(tmp.path(), ScriptedRunner::default());
        let err = fetch_archive(&ctx, &BuiltinArgs::new()).await.unwrap_err();
        assert!(err.to_string().contains("'url'"));
    }

    async fn spawn_zip_responder(zip_bytes: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let header = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    zip_bytes.len()
                );
                let _ = socket.write_all(header.as_bytes()).await;
                let _ = socket.write_all(&zip_bytes).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://127.0.0.1:{}/ez.zip", addr.port())
    }

    fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            let options = zip::write::SimpleFileOptions::default();
            for (name, contents) in entries {
                writer.start_file(*name, options).unwrap();
                writer.write_all(contents.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[tokio::test]
    async fn fetch_archive_downloads_extracts_and_updates_path() {
        let tmp = tempfile::tempdir().unwrap();
        let url = spawn_zip_responder(zip_bytes(&[("ez/bin/EzTool.exe", "MZ")])).await;
        let (ctx, env) = context(tmp.path(), ScriptedRunner::default());

        let mut args = BuiltinArgs::new();
        args.insert("url".into(), url);
        args.insert("dest".into(), "ez".into());
        args.insert("exe".into(), "eztool.exe".into());
        args.insert("add_to_path".into(), "true".into());

        fetch_archive(&ctx, &args).await.unwrap();

        let extracted = ctx.config.tools_dir().join("ez/ez/bin/EzTool.exe");
        assert!(extracted.is_file());
        // PATH gained the executable's directory, written exactly once.
        assert_eq!(env.write_count(), 1);
        let path_value = env.get(PathScope::User).unwrap();
        assert!(path_value.contains("bin"));
    }

    #[tokio::test]
    async fn fetch_archive_rejects_checksum_mismatch() {
        let tmp = tempfile::tempdir().unwrap();
        let url = spawn_zip_responder(zip_bytes(&[("tool.txt", "x")])).await;
        let (ctx, _) = context(tmp.path(), ScriptedRunner::default());

        let mut args = BuiltinArgs::new();
        args.insert("url".into(), url);
        args.insert("dest".into(), "tool".into());
        args.insert("sha256".into(), "00".repeat(32));

        let err = fetch_archive(&ctx, &args).await.unwrap_err();
        assert!(matches!(err, CaseprepError::ChecksumMismatch(_)));
    }
}
