// caseprep-common/src/config.rs
use std::env;
use std::path::{Path, PathBuf};

use directories::UserDirs;
use tracing::debug;

use super::error::Result;

// Fallback roots when CASEPREP_ROOT is not set. The Windows default matches
// the conventional forensics-tooling drop directory.
const DEFAULT_WINDOWS_ROOT: &str = "C:\\Tools";
const DEFAULT_UNIX_ROOT_DIRNAME: &str = ".caseprep";

#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub catalog_path: PathBuf,
    pub download_max_attempts: u32,
    pub download_backoff_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        debug!("Loading caseprep configuration");

        let root = match env::var("CASEPREP_ROOT").ok().filter(|s| !s.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => {
                let fallback = Self::default_root();
                debug!(
                    "CASEPREP_ROOT not set or empty, falling back to default: {}",
                    fallback.display()
                );
                fallback
            }
        };
        debug!("Effective root set to: {}", root.display());

        let catalog_path = match env::var("CASEPREP_CATALOG").ok().filter(|s| !s.is_empty()) {
            Some(p) => PathBuf::from(p),
            None => root.join("config").join("tools.json"),
        };

        Ok(Self {
            root,
            catalog_path,
            download_max_attempts: 3,
            download_backoff_secs: 5,
        })
    }

    fn default_root() -> PathBuf {
        if cfg!(windows) {
            PathBuf::from(DEFAULT_WINDOWS_ROOT)
        } else {
            UserDirs::new()
                .map(|ud| ud.home_dir().join(DEFAULT_UNIX_ROOT_DIRNAME))
                .unwrap_or_else(|| PathBuf::from("/tmp").join(DEFAULT_UNIX_ROOT_DIRNAME))
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory the external PowerShell installer scripts are resolved
    /// against.
    pub fn scripts_dir(&self) -> PathBuf {
        self.root.join("installers")
    }

    /// Scratch space for downloaded archives.
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    /// Default destination for per-run log files.
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Where extracted tools land by default.
    pub fn tools_dir(&self) -> PathBuf {
        self.root.join("tools")
    }

    pub fn catalog_path(&self) -> &Path {
        &self.catalog_path
    }

    pub fn home_dir(&self) -> PathBuf {
        UserDirs::new().map_or_else(|| PathBuf::from("/"), |ud| ud.home_dir().to_path_buf())
    }

    /// Desktop directory used for shortcut creation.
    pub fn desktop_dir(&self) -> PathBuf {
        UserDirs::new()
            .and_then(|ud| ud.desktop_dir().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| self.home_dir().join("Desktop"))
    }
}
