//! Catalog ETL: a rate-limited crawler that mirrors an upstream anime database
//!
//! This crate discovers anime, manga and character ids from the paginated
//! Jikan catalog, hydrates each id from its detail endpoint and upserts the
//! result into a local SQLite store. All outbound traffic shares one
//! dual-window rate limiter, and discovery progress is persisted so an
//! interrupted crawl resumes from the last completed page.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for catalog ETL operations
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Unknown entity kind: {0}")]
    UnknownKind(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

// Re-export commonly used types
pub use config::Config;
pub use crawler::Pipeline;
pub use state::{CrawlCursor, EntityKind};
