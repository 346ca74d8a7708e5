//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::{CrawlCursor, EntityKind};
use crate::storage::{
    AnimeRecord, AppearanceRecord, CharacterRecord, EntitySummary, MangaRecord, WorkStub,
};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Unsupported operation for {kind}: {operation}")]
    Unsupported {
        kind: EntityKind,
        operation: &'static str,
    },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Locks a shared storage handle
///
/// A poisoned lock means a writer panicked mid-statement; it is reported as a
/// database error rather than propagated as a panic.
pub fn lock_storage<S>(storage: &Mutex<S>) -> StorageResult<MutexGuard<'_, S>> {
    storage
        .lock()
        .map_err(|_| StorageError::Database("storage lock poisoned".to_string()))
}

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the pipeline.
/// Every upsert is keyed on the upstream `mal_id`; surrogate keys are never
/// used for matching.
pub trait Storage {
    // ===== Entity Upserts =====

    /// Creates or fully overwrites an anime record
    fn upsert_anime(&mut self, record: &AnimeRecord) -> StorageResult<()>;

    /// Creates or fully overwrites a manga record
    fn upsert_manga(&mut self, record: &MangaRecord) -> StorageResult<()>;

    /// Creates or fully overwrites a character record
    fn upsert_character(&mut self, record: &CharacterRecord) -> StorageResult<()>;

    /// Creates a stub anime or manga, or refreshes the stub fields of an
    /// existing record
    ///
    /// Existing metadata, the raw snapshot and `updated_at` are left alone so
    /// a stub never clobbers a full hydration or hides staleness.
    fn upsert_work_stub(&mut self, kind: EntityKind, stub: &WorkStub) -> StorageResult<()>;

    // ===== Entity Reads =====

    /// Gets the common columns of one record
    fn get_entity(&self, kind: EntityKind, mal_id: i64) -> StorageResult<Option<EntitySummary>>;

    /// Counts the records of a kind
    fn count_entities(&self, kind: EntityKind) -> StorageResult<u64>;

    /// Returns up to `limit` ids ordered by ascending `updated_at`
    ///
    /// Ties are broken by ascending `mal_id`.
    fn stalest_ids(&self, kind: EntityKind, limit: u64) -> StorageResult<Vec<i64>>;

    // ===== Appearances =====

    /// Inserts a character appearance
    ///
    /// Fails with `StorageError::ConstraintViolation` when the
    /// (character, work) pair already exists.
    fn insert_appearance(&mut self, appearance: &AppearanceRecord) -> StorageResult<()>;

    /// Gets all appearances of a character, anime first
    fn get_appearances(&self, character_id: i64) -> StorageResult<Vec<AppearanceRecord>>;

    /// Counts appearance rows linking characters to works of `work_kind`
    fn count_appearances(&self, work_kind: EntityKind) -> StorageResult<u64>;

    // ===== Discovery Cursors =====

    /// Gets the discovery cursor of a kind
    fn get_cursor(&self, kind: EntityKind) -> StorageResult<Option<CrawlCursor>>;

    /// Creates or overwrites the discovery cursor of a kind
    fn set_cursor(&mut self, kind: EntityKind, page: u32) -> StorageResult<()>;

    /// Deletes the discovery cursor of a kind
    ///
    /// Returns whether a cursor existed.
    fn reset_cursor(&mut self, kind: EntityKind) -> StorageResult<bool>;

    /// Gets every stored cursor ordered by key
    fn list_cursors(&self) -> StorageResult<Vec<CrawlCursor>>;
}
