//! Shared HTTP client for the JSON-over-HTTP providers
//!
//! One `reqwest::Client` is built per provider set and reused by every stage,
//! with a connect timeout, a per-request timeout and a small retry policy.

use contentflow_utils::error::ProviderError;
use contentflow_utils::redaction::redact_error_message;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Ceiling applied to every request timeout (1 hour, matching the largest
/// accepted stage timeout)
const DEFAULT_MAX_HTTP_TIMEOUT: Duration = Duration::from_secs(3600);

/// Default connect timeout (30 seconds)
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum number of retry attempts for 5xx and network failures
const MAX_RETRIES: u32 = 2;

/// Initial backoff duration for retries (1 second)
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Shared HTTP client for providers
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Clone)]
pub(crate) struct HttpClient {
    client: Arc<Client>,
    max_timeout: Duration,
    backoff: Duration,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Misconfiguration` if the client cannot be constructed
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_max_timeout(DEFAULT_MAX_HTTP_TIMEOUT)
    }

    /// Create a new HTTP client with a custom maximum timeout
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Misconfiguration` if the client cannot be constructed
    pub fn with_max_timeout(max_timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| {
                ProviderError::Misconfiguration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client: Arc::new(client),
            max_timeout,
            backoff: INITIAL_BACKOFF,
        })
    }

    #[cfg(test)]
    pub(crate) fn without_backoff(mut self) -> Self {
        self.backoff = Duration::ZERO;
        self
    }

    /// Start a POST request on the shared client.
    pub fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url)
    }

    /// Execute an HTTP request with timeout and retry policy
    ///
    /// - Per-request timeout: `min(request_timeout, max_timeout)`
    /// - Up to 2 retries for 5xx and network failures, backoff 1s then 2s
    /// - No retries for 4xx or timeouts
    ///
    /// # Errors
    ///
    /// - `ProviderError::Auth` for 401/403
    /// - `ProviderError::Quota` for 402
    /// - `ProviderError::RateLimited` for 429
    /// - `ProviderError::Outage` for 5xx (after retries)
    /// - `ProviderError::Timeout` for timeouts
    /// - `ProviderError::Transport` for other 4xx and network errors
    pub async fn execute_with_retry(
        &self,
        request_builder: RequestBuilder,
        request_timeout: Duration,
        provider_name: &str,
    ) -> Result<Response, ProviderError> {
        let effective_timeout = request_timeout.min(self.max_timeout);

        let mut attempt = 0;

        loop {
            attempt += 1;

            let request = request_builder
                .try_clone()
                .ok_or_else(|| {
                    ProviderError::Transport("Failed to clone request for retry".to_string())
                })?
                .timeout(effective_timeout)
                .build()
                .map_err(|e| {
                    ProviderError::Transport(format!(
                        "Failed to build request: {}",
                        redact_error_message(&e.to_string())
                    ))
                })?;

            debug!(
                provider = provider_name,
                attempt = attempt,
                timeout_secs = effective_timeout.as_secs(),
                "Executing HTTP request"
            );

            match self.client.execute(request).await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_client_error() {
                        return Err(map_client_error(status, provider_name));
                    }

                    if status.is_server_error() {
                        if attempt <= MAX_RETRIES {
                            warn!(
                                provider = provider_name,
                                attempt = attempt,
                                status = status.as_u16(),
                                "Server error, will retry"
                            );
                            tokio::time::sleep(self.backoff * attempt).await;
                            continue;
                        }

                        return Err(ProviderError::Outage(format!(
                            "{provider_name} returned server error: {status}"
                        )));
                    }

                    return Ok(response);
                }
                Err(e) => {
                    if e.is_timeout() {
                        return Err(ProviderError::Timeout {
                            duration: effective_timeout,
                        });
                    }

                    let message = redact_error_message(&e.to_string());

                    if attempt <= MAX_RETRIES {
                        warn!(
                            provider = provider_name,
                            attempt = attempt,
                            error = %message,
                            "Network error, will retry"
                        );
                        tokio::time::sleep(self.backoff * attempt).await;
                        continue;
                    }

                    return Err(ProviderError::Transport(format!(
                        "{provider_name} request failed: {message}"
                    )));
                }
            }
        }
    }
}

/// Map 4xx status codes to `ProviderError` variants
fn map_client_error(status: StatusCode, provider_name: &str) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProviderError::Auth(format!("{provider_name} authentication failed: {status}"))
        }
        StatusCode::PAYMENT_REQUIRED => {
            ProviderError::Quota(format!("{provider_name} quota exhausted: {status}"))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            ProviderError::RateLimited(format!("{provider_name} rate limit exceeded: {status}"))
        }
        _ => ProviderError::Transport(format!("{provider_name} returned client error: {status}")),
    }
}
