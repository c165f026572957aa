// caseprep-net/src/validation.rs
use std::fs::File;
use std::io::Read;
use std::path::Path;

use caseprep_common::error::{CaseprepError, Result};
use sha2::{Digest, Sha256};
use url::Url;

/// Accepts https URLs only, with one carve-out: plain http to a loopback
/// host (local mirrors and the test responder). The shared client enforces
/// TLS 1.2 as the floor for everything that does go over TLS.
pub fn validate_url(url: &str) -> Result<()> {
    let parsed = Url::parse(url)
        .map_err(|e| CaseprepError::ValidationError(format!("invalid URL '{url}': {e}")))?;

    match parsed.scheme() {
        "https" => Ok(()),
        "http" => {
            let loopback = matches!(
                parsed.host_str(),
                Some("localhost") | Some("127.0.0.1") | Some("[::1]")
            );
            if loopback {
                Ok(())
            } else {
                Err(CaseprepError::ValidationError(format!(
                    "refusing plaintext http URL '{url}' for a non-loopback host"
                )))
            }
        }
        other => Err(CaseprepError::ValidationError(format!(
            "unsupported URL scheme '{other}' in '{url}'"
        ))),
    }
}

/// Streaming SHA-256 compare against an expected hex digest.
pub fn verify_checksum(path: &Path, expected: &str) -> Result<()> {
    tracing::debug!("Verifying checksum for: {}", path.display());
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    let actual = hex::encode(hasher.finalize());
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(CaseprepError::ChecksumMismatch(format!(
            "{}: expected {}, got {}",
            path.display(),
            expected,
            actual
        )))
    }
}
