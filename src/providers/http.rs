//! HTTP plumbing shared by the network-backed providers.

use std::time::Duration;

use reqwest::{Client, Response};

use crate::{ParlayError, Result};

/// Build the shared client. Per-call deadlines are applied by the caller.
pub(crate) fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(crate::version::user_agent())
        .build()
        .map_err(|e| ParlayError::Configuration(format!("failed to build HTTP client: {e}")))
}

/// Map a non-success status to the error taxonomy.
pub(crate) async fn check_status(response: Response, backend: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status.as_u16() {
        401 | 403 => Err(ParlayError::AuthenticationFailed),
        429 => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs);
            Err(ParlayError::RateLimited { retry_after })
        }
        code => {
            let body = response.text().await.unwrap_or_default();
            let detail = body.chars().take(200).collect::<String>();
            Err(ParlayError::Api {
                status: code,
                message: format!("{backend} API error: {detail}"),
            })
        }
    }
}

/// Join a base URL and a path without doubling slashes.
pub(crate) fn join(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
