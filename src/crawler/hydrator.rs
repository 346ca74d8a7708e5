//! Per-entity hydration
//!
//! Hydrating an id fetches its full detail payload, maps it to a storage
//! record and upserts it. Character hydration also records the works the
//! character appears in.

use crate::crawler::endpoints::Endpoints;
use crate::crawler::fetcher::{FetchError, HttpFetcher};
use crate::crawler::mapping::{character_appearances, map_anime, map_character, map_manga};
use crate::crawler::payload::DetailEnvelope;
use crate::state::EntityKind;
use crate::storage::{lock_storage, AppearanceRecord, SharedStorage, Storage, StorageError};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Why a single id failed to hydrate
#[derive(Debug, Error)]
pub enum HydrateError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Unexpected payload shape: {0}")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Hydrates ids of one entity kind
pub struct EntityHydrator {
    kind: EntityKind,
    fetcher: Arc<HttpFetcher>,
    endpoints: Arc<Endpoints>,
    storage: SharedStorage,
}

impl EntityHydrator {
    pub fn new(
        kind: EntityKind,
        fetcher: Arc<HttpFetcher>,
        endpoints: Arc<Endpoints>,
        storage: SharedStorage,
    ) -> Self {
        Self {
            kind,
            fetcher,
            endpoints,
            storage,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Fetches, maps and upserts one id
    ///
    /// Re-hydrating an id overwrites its record in full; appearance rows that
    /// already exist are left as they are.
    pub async fn hydrate_one(&self, mal_id: i64) -> Result<(), HydrateError> {
        let url = self.endpoints.detail(self.kind, mal_id);
        let envelope: DetailEnvelope = self.fetcher.get_json(&url).await?;

        self.store(&envelope.data)?;

        tracing::debug!("[{} hydrate] upsert ok mal_id={}", self.kind, mal_id);
        Ok(())
    }

    /// Hydrates one id, logging and discarding any failure
    ///
    /// Returns whether the id was stored. Failures of one id never affect
    /// other ids of the same batch.
    pub async fn hydrate_logged(&self, mal_id: i64) -> bool {
        match self.hydrate_one(mal_id).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("[{} hydrate] FAIL mal_id={}: {}", self.kind, mal_id, e);
                false
            }
        }
    }

    fn store(&self, data: &Value) -> Result<(), HydrateError> {
        match self.kind {
            EntityKind::Anime => {
                let record = map_anime(data)?;
                lock_storage(&self.storage)?.upsert_anime(&record)?;
            }
            EntityKind::Manga => {
                let record = map_manga(data)?;
                lock_storage(&self.storage)?.upsert_manga(&record)?;
            }
            EntityKind::Character => {
                let record = map_character(data)?;
                let appearances = character_appearances(data);

                let mut storage = lock_storage(&self.storage)?;
                storage.upsert_character(&record)?;

                for appearance in appearances {
                    storage.upsert_work_stub(appearance.work_kind, &appearance.stub)?;

                    let link = AppearanceRecord {
                        character_id: record.mal_id,
                        work_kind: appearance.work_kind,
                        work_id: appearance.stub.mal_id,
                        role: appearance.role,
                    };
                    match storage.insert_appearance(&link) {
                        Ok(()) | Err(StorageError::ConstraintViolation(_)) => {}
                        Err(e) => return Err(e.into()),
                    }
                }
            }
        }

        Ok(())
    }
}
