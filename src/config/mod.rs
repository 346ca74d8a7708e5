//! Configuration module for the catalog ETL
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section has defaults, so an empty file yields a working configuration
//! pointed at the public Jikan API.
//!
//! # Example
//!
//! ```no_run
//! use catalog_etl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("catalog-etl.toml")).unwrap();
//! println!("Requests per second: {}", config.rate_limit.per_second);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, HydrationConfig, RateLimitConfig, RetryConfig, StorageConfig, UpstreamConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
