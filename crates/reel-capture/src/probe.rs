//! Plain HTTP reachability check of the capture target.

use std::time::Duration;

use tracing::debug;

use crate::error::CaptureError;

/// HTTP client for the probe and the discovery endpoint.
///
/// Proxies are disabled: both talk to hosts the user controls, and the
/// discovery endpoint is always on loopback.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, CaptureError> {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(timeout)
        .build()
        .map_err(|e| CaptureError::Validation {
            reason: format!("failed to build HTTP client: {e}"),
        })
}

/// Require `url` to answer a GET with a 2xx status.
pub async fn validate_target(client: &reqwest::Client, url: &str) -> Result<(), CaptureError> {
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| CaptureError::Validation {
            reason: format!("failed to access {url}: {e}"),
        })?;
    let status = resp.status();
    if !status.is_success() {
        return Err(CaptureError::Validation {
            reason: format!("HTTP {} when accessing {url}", status.as_u16()),
        });
    }
    debug!(url, status = status.as_u16(), "target reachable");
    Ok(())
}
