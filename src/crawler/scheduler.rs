//! Hydration queue
//!
//! This module handles:
//! - Bounding how many hydration batches run at once via a semaphore
//! - Fire-and-forget submission of batches
//! - Waiting for the queue to drain, including work submitted while waiting

use crate::config::HydrationConfig;
use crate::crawler::hydrator::EntityHydrator;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};

/// Decrements the pending count when a unit of work ends, however it ends
struct PendingGuard {
    pending: Arc<watch::Sender<usize>>,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// Bounded-concurrency queue of hydration batches
///
/// One queue is shared by every entity kind. Cloning yields another handle to
/// the same queue.
#[derive(Clone)]
pub struct HydrationQueue {
    /// Permits for running batches
    permits: Arc<Semaphore>,

    /// Number of submitted units that have not finished
    pending: Arc<watch::Sender<usize>>,

    concurrency: usize,
}

impl HydrationQueue {
    /// Creates a queue running at most `concurrency` units at once
    pub fn new(concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        let (pending, _) = watch::channel(0);

        Self {
            permits: Arc::new(Semaphore::new(concurrency)),
            pending: Arc::new(pending),
            concurrency,
        }
    }

    pub fn from_config(config: &HydrationConfig) -> Self {
        Self::new(config.batch_concurrency as usize)
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Units submitted but not yet finished
    pub fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    /// Enqueues one unit of work and returns immediately
    ///
    /// The pending count is raised before this returns, so an `on_idle` call
    /// made afterwards always waits for `work`.
    pub fn submit<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.pending.send_modify(|n| *n += 1);
        let guard = PendingGuard {
            pending: self.pending.clone(),
        };
        let permits = self.permits.clone();

        tokio::spawn(async move {
            let _guard = guard;
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            work.await;
        });
    }

    /// Enqueues a batch of ids to hydrate concurrently as one unit
    ///
    /// Per-id failures are logged by the hydrator and never abort the batch.
    /// An empty batch is a no-op.
    pub fn hydrate_batch(&self, hydrator: Arc<EntityHydrator>, ids: Vec<i64>) {
        if ids.is_empty() {
            return;
        }

        self.submit(async move {
            let results = join_all(ids.iter().map(|id| hydrator.hydrate_logged(*id))).await;
            let stored = results.iter().filter(|ok| **ok).count();

            tracing::info!(
                "[{} hydrate] batch done: {}/{} stored",
                hydrator.kind(),
                stored,
                ids.len()
            );
        });
    }

    /// Waits until every submitted unit has finished
    ///
    /// Units submitted while waiting, including ones submitted by running
    /// units, are waited for as well.
    pub async fn on_idle(&self) {
        let mut receiver = self.pending.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = receiver.wait_for(|pending| *pending == 0).await;
    }
}
