use serde::Deserialize;

/// Main configuration structure for the catalog ETL
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub upstream: UpstreamConfig,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    pub hydration: HydrationConfig,
    pub storage: StorageConfig,
}

/// Upstream API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UpstreamConfig {
    /// Base URL of the Jikan v4 API, without a trailing path segment
    pub base_url: String,

    /// User agent sent with every request
    pub user_agent: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.jikan.moe/v4".to_string(),
            user_agent: format!("catalog-etl/{}", env!("CARGO_PKG_VERSION")),
            request_timeout_secs: 30,
        }
    }
}

/// Global request ceilings shared by every outbound call
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RateLimitConfig {
    /// Maximum requests in any one-second window
    pub per_second: u32,

    /// Maximum requests in any sixty-second window
    pub per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_second: 3,
            per_minute: 60,
        }
    }
}

/// Retry and backoff policy for upstream requests
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Total attempts per request, including the first
    pub max_attempts: u32,

    /// Backoff unit after a 429 without a usable Retry-After header (milliseconds)
    pub rate_limited_backoff_ms: u64,

    /// Backoff unit after a 5xx response (milliseconds)
    pub server_error_backoff_ms: u64,

    /// Upper bound of the random jitter added to each backoff (milliseconds)
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            rate_limited_backoff_ms: 1500,
            server_error_backoff_ms: 800,
            jitter_ms: 200,
        }
    }
}

/// Local hydration queue configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HydrationConfig {
    /// Number of hydration batches allowed in flight at once
    pub batch_concurrency: u32,

    /// Percentage of rows re-hydrated by a refresh when none is given
    pub default_slice_percent: f64,
}

impl Default for HydrationConfig {
    fn default() -> Self {
        Self {
            batch_concurrency: 2,
            default_slice_percent: 2.0,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StorageConfig {
    /// Path to the SQLite database file
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "./catalog.db".to_string(),
        }
    }
}
