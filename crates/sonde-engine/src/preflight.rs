//! Reachability check run before any browser is launched.

use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum PreflightError {
    #[error("{url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u128 },
    #[error("{url} is unreachable: {message}")]
    Unreachable { url: String, message: String },
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// GET `url` once. Any HTTP response, including error statuses, means the
/// server is up; only connection failures and timeouts are errors.
pub async fn check_reachable(url: &str, timeout: Duration) -> Result<u16, PreflightError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| PreflightError::Client(e.to_string()))?;

    match client.get(url).send().await {
        Ok(resp) => {
            let status = resp.status().as_u16();
            info!("Preflight: {} answered HTTP {}", url, status);
            Ok(status)
        }
        Err(e) if e.is_timeout() => Err(PreflightError::Timeout {
            url: url.to_string(),
            timeout_ms: timeout.as_millis(),
        }),
        Err(e) => Err(PreflightError::Unreachable {
            url: url.to_string(),
            message: e.to_string(),
        }),
    }
}
