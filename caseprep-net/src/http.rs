// caseprep-net/src/http.rs
use std::path::Path;
use std::time::Duration;

use caseprep_common::error::{CaseprepError, Result};
use futures::StreamExt;
use reqwest::Client;
use tokio::fs::File as TokioFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::validation::validate_url;

const DOWNLOAD_TIMEOUT_SECS: u64 = 300;
const CONNECT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT_STRING: &str = "caseprep workstation provisioner (Rust)";

pub fn build_http_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT_STRING)
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .min_tls_version(reqwest::tls::Version::TLS_1_2)
        .build()
        .map_err(|e| CaseprepError::Generic(format!("Failed to build HTTP client: {e}")))
}

/// Fetches `url` into `dest`, retrying transient failures (request errors
/// and non-2xx responses after redirects) up to `max_attempts` times with a
/// fixed backoff between attempts. A partial file from a failed attempt is
/// truncated on the next one; there is no resume.
pub async fn download_with_retry(
    client: &Client,
    url: &str,
    dest: &Path,
    max_attempts: u32,
    backoff: Duration,
) -> Result<()> {
    validate_url(url)?;
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            CaseprepError::IoError(format!(
                "Failed to create download directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    let attempts = max_attempts.max(1);
    let mut last_error: Option<CaseprepError> = None;

    for attempt in 1..=attempts {
        debug!("Download attempt {}/{} for {}", attempt, attempts, url);
        match download_once(client, url, dest).await {
            Ok(bytes) => {
                debug!("Downloaded {} bytes to {}", bytes, dest.display());
                return Ok(());
            }
            Err(e) => {
                warn!("Download attempt {}/{} failed: {}", attempt, attempts, e);
                last_error = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    let reason = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "all download attempts failed".to_string());
    Err(CaseprepError::DownloadError(url.to_string(), reason))
}

async fn download_once(client: &Client, url: &str, dest: &Path) -> Result<u64> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CaseprepError::DownloadError(
            url.to_string(),
            format!("server returned status {status}"),
        ));
    }

    // Truncates any partial file left behind by a previous attempt.
    let mut file = TokioFile::create(dest).await.map_err(|e| {
        CaseprepError::IoError(format!("Failed to create {}: {e}", dest.display()))
    })?;

    let mut written: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await.map_err(|e| {
            CaseprepError::IoError(format!("Failed writing to {}: {e}", dest.display()))
        })?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(|e| {
        CaseprepError::IoError(format!("Failed flushing {}: {e}", dest.display()))
    })?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt as _};
    use tokio::net::TcpListener;

    use super::*;

    /// Minimal canned-response HTTP server: answers each connection with the
    /// next response from the list, counting requests served.
    async fn spawn_responder(responses: Vec<String>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);
        tokio::spawn(async move {
            for response in responses {
                let (mut socket, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                hits_clone.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        (format!("http://127.0.0.1:{}", addr.port()), hits)
    }

    fn ok_response(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )
    }

    fn error_response() -> String {
        "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            .to_string()
    }

    #[tokio::test]
    async fn succeeds_on_third_attempt_with_exactly_three_requests() {
        let (base, hits) =
            spawn_responder(vec![error_response(), error_response(), ok_response("data")]).await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("tool.zip");
        let client = build_http_client().unwrap();

        download_with_retry(
            &client,
            &format!("{base}/tool.zip"),
            &dest,
            3,
            Duration::from_millis(10),
        )
        .await
        .unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "data");
    }

    #[tokio::test]
    async fn exhausted_attempts_surface_the_last_error() {
        let (base, hits) = spawn_responder(vec![error_response(), error_response()]).await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("tool.zip");
        let client = build_http_client().unwrap();

        let err = download_with_retry(
            &client,
            &format!("{base}/tool.zip"),
            &dest,
            2,
            Duration::from_millis(10),
        )
        .await
        .unwrap_err();

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        match err {
            CaseprepError::DownloadError(_, reason) => assert!(reason.contains("500")),
            other => panic!("expected DownloadError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn partial_file_is_overwritten_by_a_later_attempt() {
        let (base, _) = spawn_responder(vec![ok_response("fresh")]).await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("tool.zip");
        std::fs::write(&dest, "stale partial content from a failed run").unwrap();
        let client = build_http_client().unwrap();

        download_with_retry(
            &client,
            &format!("{base}/tool.zip"),
            &dest,
            1,
            Duration::from_millis(10),
        )
        .await
        .unwrap();

        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "fresh");
    }

    #[tokio::test]
    async fn invalid_url_fails_before_any_request() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("x");
        let client = build_http_client().unwrap();
        let err = download_with_retry(
            &client,
            "ftp://example.com/x",
            &dest,
            3,
            Duration::from_millis(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CaseprepError::ValidationError(_)));
    }
}
