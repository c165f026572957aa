// caseprep-common/src/error.rs
use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum CaseprepError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("HTTP Request Error: {0}")]
    Http(#[from] Arc<reqwest::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Malformed catalog: {0}")]
    MalformedCatalog(String),

    #[error("Prerequisite missing: {0}")]
    PrerequisiteMissing(String),

    #[error("DownloadError: Failed to download '{0}': {1}")]
    DownloadError(String, String),

    #[error("Installation Error: {0}")]
    InstallError(String),

    #[error("Failed to execute command: {0}")]
    CommandExec(String),

    #[error("Extraction Error: {0}")]
    ExtractError(String),

    #[error("Unsupported shell operation: {0}")]
    UnsupportedShellOperation(String),

    #[error("Validation Error: {0}")]
    ValidationError(String),

    #[error("Checksum Mismatch: {0}")]
    ChecksumMismatch(String),

    #[error("IoError: {0}")]
    IoError(String),

    #[error("Generic Error: {0}")]
    Generic(String),
}

pub type Result<T, E = CaseprepError> = std::result::Result<T, E>;

impl From<std::io::Error> for CaseprepError {
    fn from(err: std::io::Error) -> Self {
        CaseprepError::Io(Arc::new(err))
    }
}

impl From<reqwest::Error> for CaseprepError {
    fn from(err: reqwest::Error) -> Self {
        CaseprepError::Http(Arc::new(err))
    }
}

impl From<serde_json::Error> for CaseprepError {
    fn from(err: serde_json::Error) -> Self {
        CaseprepError::Json(Arc::new(err))
    }
}

impl CaseprepError {
    /// Whether this error is benign for the overall run (logged as a
    /// warning rather than failing the tool that produced it).
    pub fn is_benign(&self) -> bool {
        matches!(self, CaseprepError::UnsupportedShellOperation(_))
    }
}
