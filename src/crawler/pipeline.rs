//! Pipeline wiring
//!
//! Builds the process-wide pieces once (rate limiter, HTTP fetcher, hydration
//! queue) and one orchestrator per entity kind on top of them. The CLI and
//! any other administrative caller go through [`Pipeline`].

use crate::config::Config;
use crate::crawler::coordinator::{CrawlOrchestrator, CrawlReport, RefreshReport};
use crate::crawler::endpoints::Endpoints;
use crate::crawler::fetcher::{build_http_client, HttpFetcher, RetryPolicy};
use crate::crawler::hydrator::HydrateError;
use crate::crawler::rate_limiter::RateLimiter;
use crate::crawler::scheduler::HydrationQueue;
use crate::output::{load_statistics, CatalogStatistics};
use crate::state::EntityKind;
use crate::storage::{lock_storage, SharedStorage, Storage};
use crate::EtlError;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Entry point for crawl, refresh and status operations
pub struct Pipeline {
    storage: SharedStorage,
    queue: HydrationQueue,
    anime: Arc<CrawlOrchestrator>,
    manga: Arc<CrawlOrchestrator>,
    characters: Arc<CrawlOrchestrator>,
}

impl Pipeline {
    /// Creates a pipeline with the rate limits from `config`
    pub fn new(config: &Config, storage: SharedStorage) -> Result<Self, EtlError> {
        let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
        Self::with_limiter(config, storage, limiter)
    }

    /// Creates a pipeline sharing an existing rate limiter
    pub fn with_limiter(
        config: &Config,
        storage: SharedStorage,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self, EtlError> {
        let client = build_http_client(&config.upstream)?;
        let fetcher = Arc::new(HttpFetcher::new(
            client,
            limiter,
            RetryPolicy::from_config(&config.retry),
        ));
        let endpoints = Arc::new(Endpoints::new(&config.upstream.base_url)?);
        let queue = HydrationQueue::from_config(&config.hydration);

        let orchestrator = |kind| {
            Arc::new(CrawlOrchestrator::new(
                kind,
                fetcher.clone(),
                endpoints.clone(),
                storage.clone(),
                queue.clone(),
            ))
        };

        Ok(Self {
            anime: orchestrator(EntityKind::Anime),
            manga: orchestrator(EntityKind::Manga),
            characters: orchestrator(EntityKind::Character),
            storage,
            queue,
        })
    }

    pub fn orchestrator(&self, kind: EntityKind) -> &Arc<CrawlOrchestrator> {
        match kind {
            EntityKind::Anime => &self.anime,
            EntityKind::Manga => &self.manga,
            EntityKind::Character => &self.characters,
        }
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    /// Row counts, appearance counts and cursors
    pub fn status(&self) -> Result<CatalogStatistics, EtlError> {
        let storage = lock_storage(&self.storage)?;
        Ok(load_statistics(&*storage)?)
    }

    /// Deletes the discovery cursor of `kind` so the next crawl starts over
    ///
    /// Returns whether a cursor existed.
    pub fn reset_cursor(&self, kind: EntityKind) -> Result<bool, EtlError> {
        let existed = lock_storage(&self.storage)?.reset_cursor(kind)?;
        tracing::info!("[{} crawl] cursor reset (existed: {})", kind, existed);
        Ok(existed)
    }

    /// Runs full discovery of `kind` to completion
    pub async fn crawl(&self, kind: EntityKind) -> Result<CrawlReport, EtlError> {
        self.orchestrator(kind).crawl_all_pages().await
    }

    /// Starts full discovery of `kind` in the background
    ///
    /// The task logs its own failure; the handle only tells when it ended.
    pub fn start_crawl(&self, kind: EntityKind) -> JoinHandle<()> {
        let orchestrator = self.orchestrator(kind).clone();

        tokio::spawn(async move {
            if let Err(e) = orchestrator.crawl_all_pages().await {
                tracing::error!("[{} crawl] FAILED: {}", orchestrator.kind(), e);
            }
        })
    }

    /// Re-hydrates the stalest `slice_percent` percent of `kind`
    pub async fn refresh(
        &self,
        kind: EntityKind,
        slice_percent: f64,
    ) -> Result<RefreshReport, EtlError> {
        self.orchestrator(kind).incremental_refresh(slice_percent).await
    }

    /// Hydrates a single id of `kind`, reporting any failure
    pub async fn hydrate(&self, kind: EntityKind, mal_id: i64) -> Result<(), HydrateError> {
        self.orchestrator(kind).hydrator().hydrate_one(mal_id).await
    }

    /// Waits for every queued hydration batch to finish
    pub async fn wait_idle(&self) {
        self.queue.on_idle().await;
    }
}
