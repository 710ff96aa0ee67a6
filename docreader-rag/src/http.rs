//! Shared HTTP plumbing for the OpenAI-compatible backends.
//!
//! Both the embedding provider and the chat generator POST JSON to an
//! OpenAI-style endpoint with a bounded timeout and retry transient failures
//! (HTTP 429, 5xx, connect and timeout errors) with exponential backoff.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Timeout and retry settings for an external HTTP backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpOptions {
    /// Per-request deadline, covering connect through body download.
    pub timeout: Duration,
    /// Retries after the first attempt. Zero disables retrying.
    pub max_retries: usize,
    /// Base delay; attempt `n` waits `backoff * 2^n`, capped at `2^5`.
    pub backoff: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(30), max_retries: 2, backoff: Duration::from_millis(500) }
    }
}

/// Why a request ultimately failed, after retries.
#[derive(Debug, thiserror::Error)]
pub(crate) enum SendError {
    #[error("request timed out")]
    Timeout,
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("API returned {status}: {detail}")]
    Status { status: reqwest::StatusCode, detail: String },
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// A JSON-over-HTTP client with bearer auth, timeout and retry.
#[derive(Debug, Clone)]
pub(crate) struct JsonClient {
    client: reqwest::Client,
    api_key: Option<String>,
    options: HttpOptions,
}

impl JsonClient {
    pub(crate) fn new(api_key: Option<String>, options: HttpOptions) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(options.timeout).build()?;
        let api_key = api_key.filter(|key| !key.trim().is_empty());
        Ok(Self { client, api_key, options })
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.options.timeout
    }

    /// POST `body` to `url`, returning the first successful response.
    pub(crate) async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<reqwest::Response, SendError> {
        let mut attempt = 0usize;
        loop {
            let mut request = self.client.post(url).json(body);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            let failure = match request.send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    let detail = serde_json::from_str::<ErrorResponse>(&body)
                        .map(|e| e.error.message)
                        .unwrap_or(body);
                    let retryable = should_retry(status);
                    (SendError::Status { status, detail }, retryable)
                }
                Err(e) if e.is_timeout() => (SendError::Timeout, true),
                Err(e) => {
                    let retryable = is_retryable_error(&e);
                    (SendError::Transport(e), retryable)
                }
            };

            match failure {
                (err, true) if attempt < self.options.max_retries => {
                    attempt += 1;
                    let delay = retry_backoff(self.options.backoff, attempt);
                    warn!(url, attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying request");
                    tokio::time::sleep(delay).await;
                }
                (err, _) => return Err(err),
            }
        }
    }
}

fn should_retry(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

fn retry_backoff(base: Duration, attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    base * (1 << capped)
}

/// Join a base URL and an endpoint path with exactly one slash.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}
