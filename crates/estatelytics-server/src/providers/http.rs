use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::warn;

use estatelytics_core::error::ProviderError;

/// Upper bound on how much of an error body ends up in logs.
const ERROR_BODY_LIMIT: usize = 300;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub retries: u32,
    /// Base delay, multiplied by the attempt number.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32) -> Self {
        Self {
            retries,
            backoff: Duration::from_millis(250),
        }
    }
}

/// Shared client for provider calls. `timeout` bounds a single attempt.
pub fn build_client(timeout: Duration) -> anyhow::Result<Client> {
    Ok(Client::builder()
        .connect_timeout(Duration::from_secs(3))
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .build()?)
}

fn is_transient(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// Send a request, retrying transport errors, 5xx and 429.
///
/// `build` is called once per attempt because a `RequestBuilder` is consumed
/// by `send`. Any other non-success status fails immediately.
pub async fn send_with_retry<F>(
    provider: &'static str,
    policy: RetryPolicy,
    build: F,
) -> Result<Response, ProviderError>
where
    F: Fn() -> RequestBuilder,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let err = match build().send().await {
            Ok(resp) if resp.status().is_success() => return Ok(resp),
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                let err = ProviderError::Unreachable(format!(
                    "{provider} responded with status {status}: {}",
                    truncate(&body)
                ));
                if !is_transient(status) {
                    return Err(err);
                }
                err
            }
            Err(e) => ProviderError::Unreachable(format!("{provider} request failed: {e}")),
        };

        if attempt > policy.retries {
            return Err(err);
        }
        warn!(provider, attempt, error = %err, "transient provider failure, retrying");
        tokio::time::sleep(policy.backoff * attempt).await;
    }
}

/// Read the full body and decode it. Body read failures are transport
/// problems; decode failures are schema drift.
pub async fn decode_json<T: DeserializeOwned>(
    provider: &'static str,
    resp: Response,
) -> Result<T, ProviderError> {
    let bytes = resp
        .bytes()
        .await
        .map_err(|e| ProviderError::Unreachable(format!("{provider} body read failed: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ProviderError::Malformed(format!("{provider} response parse failed: {e}")))
}
