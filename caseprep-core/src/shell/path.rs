// caseprep-core/src/shell/path.rs
use std::env;
use std::path::Path;
use std::sync::Arc;

use caseprep_common::error::{CaseprepError, Result};
use caseprep_common::model::PathScope;
use tracing::{debug, info, warn};

use crate::exec::{powershell_args, ps_quote, CommandRunner, POWERSHELL};

/// Persistent environment-variable store for the PATH variable, keyed by
/// scope. Production goes through PowerShell; tests use an in-memory map.
pub trait EnvStore: Send + Sync {
    fn get(&self, scope: PathScope) -> Result<String>;
    fn set(&self, scope: PathScope, value: &str) -> Result<()>;
}

pub struct PowershellEnvStore {
    runner: Arc<dyn CommandRunner>,
}

impl PowershellEnvStore {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

impl EnvStore for PowershellEnvStore {
    fn get(&self, scope: PathScope) -> Result<String> {
        let cmd = format!(
            "[Environment]::GetEnvironmentVariable('Path','{}')",
            scope.as_str()
        );
        let out = self.runner.run(POWERSHELL, &powershell_args(&cmd))?;
        if !out.success() {
            return Err(CaseprepError::CommandExec(format!(
                "reading {} PATH failed: {}",
                scope.as_str(),
                out.stderr.trim()
            )));
        }
        Ok(out.stdout.trim_end_matches(['\r', '\n']).to_string())
    }

    fn set(&self, scope: PathScope, value: &str) -> Result<()> {
        let cmd = format!(
            "[Environment]::SetEnvironmentVariable('Path','{}','{}')",
            ps_quote(value),
            scope.as_str()
        );
        let out = self.runner.run(POWERSHELL, &powershell_args(&cmd))?;
        if !out.success() {
            return Err(CaseprepError::CommandExec(format!(
                "writing {} PATH failed: {}",
                scope.as_str(),
                out.stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Appends `dir` to the persistent PATH for `scope` unless an equivalent
/// entry (trailing-separator-normalized, case-insensitive) is already
/// present. Also refreshes the current process's PATH so spawned children
/// inherit the change without a new login session.
///
/// Returns whether the persistent variable was written. Calling twice with
/// the same directory writes exactly once.
pub fn add_to_path(store: &dyn EnvStore, dir: &Path, scope: PathScope) -> Result<bool> {
    let current = store.get(scope)?;
    let wanted = normalize_entry(&dir.display().to_string());
    if wanted.is_empty() {
        return Err(CaseprepError::ValidationError(
            "cannot add an empty directory to PATH".to_string(),
        ));
    }

    let present = current
        .split(';')
        .map(normalize_entry)
        .any(|entry| entry == wanted);
    if present {
        debug!(
            "{} already on {} PATH, skipping write",
            dir.display(),
            scope.as_str()
        );
        refresh_process_path(dir);
        return Ok(false);
    }

    let updated = if current.trim().is_empty() {
        dir.display().to_string()
    } else {
        format!("{};{}", current.trim_end_matches(';'), dir.display())
    };
    store.set(scope, &updated)?;
    info!("Added {} to {} PATH", dir.display(), scope.as_str());

    refresh_process_path(dir);
    Ok(true)
}

/// Makes the directory visible to processes spawned from this one.
fn refresh_process_path(dir: &Path) {
    let current = env::var_os("PATH").unwrap_or_default();
    let mut parts: Vec<_> = env::split_paths(&current).collect();
    let wanted = normalize_entry(&dir.display().to_string());
    if parts
        .iter()
        .any(|p| normalize_entry(&p.display().to_string()) == wanted)
    {
        return;
    }
    parts.push(dir.to_path_buf());
    match env::join_paths(parts) {
        Ok(joined) => env::set_var("PATH", joined),
        Err(e) => warn!("Could not refresh process PATH with {}: {}", dir.display(), e),
    }
}

fn normalize_entry(entry: &str) -> String {
    entry
        .trim()
        .trim_end_matches(['\\', '/'])
        .to_ascii_lowercase()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// In-memory store recording every persistent write.
    #[derive(Default)]
    pub struct MemoryEnvStore {
        values: Mutex<HashMap<PathScope, String>>,
        pub writes: Mutex<Vec<(PathScope, String)>>,
    }

    impl MemoryEnvStore {
        pub fn with_path(scope: PathScope, value: &str) -> Self {
            let store = Self::default();
            store
                .values
                .lock()
                .unwrap()
                .insert(scope, value.to_string());
            store
        }

        pub fn write_count(&self) -> usize {
            self.writes.lock().unwrap().len()
        }
    }

    impl EnvStore for MemoryEnvStore {
        fn get(&self, scope: PathScope) -> Result<String> {
            Ok(self
                .values
                .lock()
                .unwrap()
                .get(&scope)
                .cloned()
                .unwrap_or_default())
        }

        fn set(&self, scope: PathScope, value: &str) -> Result<()> {
            self.values
                .lock()
                .unwrap()
                .insert(scope, value.to_string());
            self.writes
                .lock()
                .unwrap()
                .push((scope, value.to_string()));
            Ok(())
        }
    }
}
