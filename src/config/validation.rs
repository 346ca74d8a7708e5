use crate::config::types::{
    Config, HydrationConfig, RateLimitConfig, RetryConfig, StorageConfig, UpstreamConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_upstream_config(&config.upstream)?;
    validate_rate_limit_config(&config.rate_limit)?;
    validate_retry_config(&config.retry)?;
    validate_hydration_config(&config.hydration)?;
    validate_storage_config(&config.storage)?;
    Ok(())
}

/// Validates upstream configuration
fn validate_upstream_config(config: &UpstreamConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url must use http or https, got '{}'",
            config.base_url
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates the request ceilings
fn validate_rate_limit_config(config: &RateLimitConfig) -> Result<(), ConfigError> {
    if config.per_second < 1 {
        return Err(ConfigError::Validation(format!(
            "per_second must be >= 1, got {}",
            config.per_second
        )));
    }

    if config.per_minute < 1 {
        return Err(ConfigError::Validation(format!(
            "per_minute must be >= 1, got {}",
            config.per_minute
        )));
    }

    Ok(())
}

/// Validates retry policy
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    Ok(())
}

/// Validates hydration queue settings
fn validate_hydration_config(config: &HydrationConfig) -> Result<(), ConfigError> {
    if config.batch_concurrency < 1 || config.batch_concurrency > 16 {
        return Err(ConfigError::Validation(format!(
            "batch_concurrency must be between 1 and 16, got {}",
            config.batch_concurrency
        )));
    }

    if !(0.0..=100.0).contains(&config.default_slice_percent) {
        return Err(ConfigError::Validation(format!(
            "default_slice_percent must be between 0 and 100, got {}",
            config.default_slice_percent
        )));
    }

    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
