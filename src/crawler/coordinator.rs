//! Crawl orchestration
//!
//! This module drives the two crawl modes of one entity kind:
//! - Full discovery: walk the paginated catalog from the stored cursor,
//!   hand each page's ids to the hydration queue and advance the cursor
//! - Incremental refresh: re-hydrate the stalest slice of stored records

use crate::crawler::endpoints::Endpoints;
use crate::crawler::fetcher::HttpFetcher;
use crate::crawler::hydrator::EntityHydrator;
use crate::crawler::payload::CatalogPage;
use crate::crawler::scheduler::HydrationQueue;
use crate::state::{CrawlCursor, EntityKind};
use crate::storage::{lock_storage, SharedStorage, Storage};
use crate::EtlError;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of a full discovery run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    pub kind: EntityKind,
    /// First catalog page fetched
    pub start_page: u32,
    /// Last catalog page fetched, which the cursor now holds
    pub last_page: u32,
    /// Catalog pages fetched by this run
    pub pages: u32,
    /// Ids handed to hydration
    pub ids_discovered: usize,
    pub elapsed: Duration,
}

/// Outcome of an incremental refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshReport {
    /// Records of the kind before the refresh
    pub total: u64,
    /// Records selected for re-hydration
    pub selected: u64,
}

/// Number of records a refresh of `slice_percent` percent re-hydrates
///
/// The percentage is clamped to `0..=100` (non-finite values count as 0) and
/// at least one record is selected whenever `total` is non-zero.
pub fn refresh_slice_size(total: u64, slice_percent: f64) -> u64 {
    if total == 0 {
        return 0;
    }

    let pct = if slice_percent.is_finite() {
        slice_percent.clamp(0.0, 100.0)
    } else {
        0.0
    };

    let slice = (pct / 100.0 * total as f64).floor() as u64;
    slice.clamp(1, total)
}

/// Runs discovery and refresh for one entity kind
pub struct CrawlOrchestrator {
    kind: EntityKind,
    fetcher: Arc<HttpFetcher>,
    endpoints: Arc<Endpoints>,
    storage: SharedStorage,
    queue: HydrationQueue,
    hydrator: Arc<EntityHydrator>,
}

impl CrawlOrchestrator {
    pub fn new(
        kind: EntityKind,
        fetcher: Arc<HttpFetcher>,
        endpoints: Arc<Endpoints>,
        storage: SharedStorage,
        queue: HydrationQueue,
    ) -> Self {
        let hydrator = Arc::new(EntityHydrator::new(
            kind,
            fetcher.clone(),
            endpoints.clone(),
            storage.clone(),
        ));

        Self {
            kind,
            fetcher,
            endpoints,
            storage,
            queue,
            hydrator,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn hydrator(&self) -> &Arc<EntityHydrator> {
        &self.hydrator
    }

    /// Walks the catalog from the stored cursor to the last page
    ///
    /// For each page: fetch the listing, enqueue its ids for hydration
    /// without waiting, then persist the page number as the cursor. The
    /// cursor can therefore run ahead of hydration; a batch lost to a crash
    /// is only recovered by a later refresh. Returns once every enqueued
    /// batch has finished.
    ///
    /// # Errors
    ///
    /// A failed catalog fetch or cursor write ends the run. The cursor keeps
    /// the last page that was advanced past.
    pub async fn crawl_all_pages(&self) -> Result<CrawlReport, EtlError> {
        let started = Instant::now();

        let cursor = lock_storage(&self.storage)?.get_cursor(self.kind)?;
        let start_page = CrawlCursor::start_page(cursor.as_ref());

        tracing::info!("[{} crawl] starting at page {}", self.kind, start_page);

        let mut page = start_page;
        let mut pages = 0;
        let mut ids_discovered = 0;

        loop {
            let url = self.endpoints.catalog(self.kind, page);
            let listing: CatalogPage = self.fetcher.get_json(&url).await?;

            let ids = listing.ids();
            tracing::info!(
                "[{} crawl] page {}: {} ids{}",
                self.kind,
                page,
                ids.len(),
                listing
                    .pagination
                    .last_visible_page
                    .map(|last| format!(" (of {} pages)", last))
                    .unwrap_or_default()
            );

            ids_discovered += ids.len();
            pages += 1;
            self.queue.hydrate_batch(self.hydrator.clone(), ids);

            lock_storage(&self.storage)?.set_cursor(self.kind, page)?;

            if !listing.has_next_page() {
                break;
            }
            page += 1;
        }

        self.queue.on_idle().await;

        let report = CrawlReport {
            kind: self.kind,
            start_page,
            last_page: page,
            pages,
            ids_discovered,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            "[{} crawl] done: {} pages, {} ids in {:.1}s",
            self.kind,
            report.pages,
            report.ids_discovered,
            report.elapsed.as_secs_f64()
        );

        Ok(report)
    }

    /// Re-hydrates the `slice_percent` percent of records updated longest ago
    ///
    /// Does nothing, and makes no requests, when no records exist. Returns
    /// once the slice has been hydrated.
    pub async fn incremental_refresh(
        &self,
        slice_percent: f64,
    ) -> Result<RefreshReport, EtlError> {
        let (total, ids) = {
            let storage = lock_storage(&self.storage)?;
            let total = storage.count_entities(self.kind)?;
            let slice = refresh_slice_size(total, slice_percent);
            let ids = if slice == 0 {
                Vec::new()
            } else {
                storage.stalest_ids(self.kind, slice)?
            };
            (total, ids)
        };

        if ids.is_empty() {
            tracing::info!("[{} refresh] nothing to refresh", self.kind);
            return Ok(RefreshReport { total, selected: 0 });
        }

        let selected = ids.len() as u64;
        tracing::info!(
            "[{} refresh] refreshing {} of {} records",
            self.kind,
            selected,
            total
        );

        self.queue.hydrate_batch(self.hydrator.clone(), ids);
        self.queue.on_idle().await;

        Ok(RefreshReport { total, selected })
    }
}
