//! HTTP fetcher implementation
//!
//! This module handles all requests to the upstream API, including:
//! - Building HTTP clients with the configured user agent
//! - Routing every attempt through the global rate limiter
//! - Retry logic for transient failures
//! - Error classification

use crate::config::{RetryConfig, UpstreamConfig};
use crate::crawler::rate_limiter::RateLimiter;
use rand::Rng;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Longest response body excerpt carried by [`FetchError::Status`]
const BODY_EXCERPT_CHARS: usize = 200;

/// Errors surfaced by [`HttpFetcher::get_json`]
#[derive(Debug, Error)]
pub enum FetchError {
    /// A non-retryable status (any 4xx other than 429)
    #[error("HTTP {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    /// Every attempt returned 429 or 5xx
    #[error("Failed after {attempts} attempts: {url}")]
    RetriesExhausted { url: String, attempts: u32 },

    /// The request never produced a response
    #[error("Network error for {url}: {source}")]
    Network {
        url: String,
        source: reqwest::Error,
    },

    /// A successful response whose body was not the expected JSON
    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        source: reqwest::Error,
    },
}

impl FetchError {
    /// HTTP status of a non-retryable failure
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Retry and backoff policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first
    pub max_attempts: u32,

    /// Backoff unit after a 429 without a usable Retry-After header
    pub rate_limited_backoff: Duration,

    /// Backoff unit after a 5xx response
    pub server_error_backoff: Duration,

    /// Upper bound of the random jitter added to each backoff
    pub max_jitter: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            rate_limited_backoff: Duration::from_millis(config.rate_limited_backoff_ms),
            server_error_backoff: Duration::from_millis(config.server_error_backoff_ms),
            max_jitter: Duration::from_millis(config.jitter_ms),
        }
    }

    /// Backoff before the attempt after `attempt` (1-based): `base × attempt + jitter`
    pub fn backoff(&self, base: Duration, attempt: u32) -> Duration {
        base.saturating_mul(attempt) + jitter(self.max_jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

fn jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..=max_ms))
}

/// Parses a `Retry-After` header given in (possibly fractional) seconds
///
/// HTTP-date values and anything non-numeric yield `None`.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if value.is_empty() {
        return None;
    }

    let seconds: f64 = value.parse().ok()?;
    // Rejects negative, non-finite and out-of-range values
    Duration::try_from_secs_f64(seconds).ok()
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The upstream configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &UpstreamConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Issues rate-limited, retrying GET requests for JSON resources
pub struct HttpFetcher {
    client: Client,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(client: Client, limiter: Arc<RateLimiter>, policy: RetryPolicy) -> Self {
        Self {
            client,
            limiter,
            policy,
        }
    }

    /// Fetches `url` and decodes the body as `T`
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | status < 300 | Decode JSON and return |
    /// | HTTP 429 | Sleep Retry-After seconds, else `rate_limited_backoff × attempt + jitter`, retry |
    /// | HTTP 5xx | Sleep `server_error_backoff × attempt + jitter`, retry |
    /// | Other status | Fail immediately with a body excerpt |
    /// | Transport error | Fail immediately |
    ///
    /// After `max_attempts` retryable responses the call fails with
    /// [`FetchError::RetriesExhausted`]; no sleep follows the final attempt.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let max_attempts = self.policy.max_attempts;

        for attempt in 1..=max_attempts {
            let response = self
                .limiter
                .schedule(|| self.client.get(url).send())
                .await
                .map_err(|source| FetchError::Network {
                    url: url.to_string(),
                    source,
                })?;

            let status = response.status();

            if status.as_u16() < 300 {
                return response
                    .json::<T>()
                    .await
                    .map_err(|source| FetchError::Decode {
                        url: url.to_string(),
                        source,
                    });
            }

            let delay = if status == StatusCode::TOO_MANY_REQUESTS {
                parse_retry_after(response.headers()).unwrap_or_else(|| {
                    self.policy.backoff(self.policy.rate_limited_backoff, attempt)
                })
            } else if status.as_u16() >= 500 {
                self.policy.backoff(self.policy.server_error_backoff, attempt)
            } else {
                let body = response.text().await.unwrap_or_default();
                return Err(FetchError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                    body: excerpt(&body),
                });
            };

            if attempt < max_attempts {
                tracing::warn!(
                    "HTTP {} for {} (attempt {}/{}), retrying in {:?}",
                    status.as_u16(),
                    url,
                    attempt,
                    max_attempts,
                    delay
                );
                tokio::time::sleep(delay).await;
            } else {
                tracing::warn!(
                    "HTTP {} for {} on final attempt {}",
                    status.as_u16(),
                    url,
                    attempt
                );
            }
        }

        Err(FetchError::RetriesExhausted {
            url: url.to_string(),
            attempts: max_attempts,
        })
    }
}
