//! Crawler module for catalog discovery and entity hydration
//!
//! This module contains the core pipeline logic, including:
//! - A global dual-window rate limiter for every outbound request
//! - HTTP fetching with status-aware retry logic
//! - Mapping upstream payloads to storage records
//! - A bounded hydration queue
//! - Per-kind crawl orchestration

mod coordinator;
mod endpoints;
mod fetcher;
mod hydrator;
mod mapping;
mod payload;
mod pipeline;
mod rate_limiter;
mod scheduler;

pub use coordinator::{refresh_slice_size, CrawlOrchestrator, CrawlReport, RefreshReport};
pub use endpoints::Endpoints;
pub use fetcher::{build_http_client, parse_retry_after, FetchError, HttpFetcher, RetryPolicy};
pub use hydrator::{EntityHydrator, HydrateError};
pub use mapping::{character_appearances, map_anime, map_character, map_manga, Appearance};
pub use payload::{CatalogPage, CatalogStub, DetailEnvelope, Pagination};
pub use pipeline::Pipeline;
pub use rate_limiter::{RateLimiter, RateWindow};
pub use scheduler::HydrationQueue;
