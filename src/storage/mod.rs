//! Storage module for persisting hydrated entities
//!
//! This module handles all database operations for the pipeline, including:
//! - SQLite database initialization and schema management
//! - Upserts of anime, manga and character records keyed on their upstream id
//! - Stub records for works referenced by character appearances
//! - Character appearance relationships
//! - Discovery cursor persistence

mod schema;
mod sqlite;
mod traits;

pub use sqlite::{init_database, SharedStorage, SqliteStorage};
pub use traits::{lock_storage, Storage, StorageError, StorageResult};

use crate::state::EntityKind;
use crate::EtlError;
use serde_json::Value;

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(EtlError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, EtlError> {
    SqliteStorage::new(path)
}

/// A fully mapped anime record
#[derive(Debug, Clone, PartialEq)]
pub struct AnimeRecord {
    pub mal_id: i64,
    pub title: String,
    pub title_english: Option<String>,
    pub title_japanese: Option<String>,
    pub url: Option<String>,
    pub images: Value,
    pub synopsis: Option<String>,
    pub episodes: Option<i64>,
    pub status: Option<String>,
    pub anime_type: Option<String>,
    pub source: Option<String>,
    pub rating: Option<String>,
    pub score: Option<f64>,
    pub rank: Option<i64>,
    pub popularity: Option<i64>,
    pub favorites: i64,
    pub genres: Vec<String>,
    pub studios: Vec<String>,
    pub season: Option<String>,
    pub year: Option<i64>,
    pub duration: Option<String>,
    pub raw: Value,
}

/// A fully mapped manga record
#[derive(Debug, Clone, PartialEq)]
pub struct MangaRecord {
    pub mal_id: i64,
    pub title: String,
    pub title_english: Option<String>,
    pub title_japanese: Option<String>,
    pub url: Option<String>,
    pub images: Value,
    pub synopsis: Option<String>,
    pub chapters: Option<i64>,
    pub volumes: Option<i64>,
    pub status: Option<String>,
    pub manga_type: Option<String>,
    pub score: Option<f64>,
    pub rank: Option<i64>,
    pub popularity: Option<i64>,
    pub favorites: i64,
    pub genres: Vec<String>,
    pub authors: Vec<String>,
    pub serialization: Option<String>,
    pub year: Option<i64>,
    pub raw: Value,
}

/// A fully mapped character record
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterRecord {
    pub mal_id: i64,
    pub name: String,
    pub name_kanji: Option<String>,
    pub url: Option<String>,
    pub about: Option<String>,
    pub nicknames: Vec<String>,
    pub images: Value,
    pub favorites: i64,
    pub raw: Value,
}

/// Minimal anime or manga record created from a character appearance
///
/// Only carries what the nested appearance payload has, so the work exists
/// as a relationship target before it is hydrated on its own. Absent fields
/// are `None` and never overwrite stored values.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkStub {
    pub mal_id: i64,
    pub title: Option<String>,
    pub url: Option<String>,
    pub images: Option<Value>,
    pub raw: Value,
}

/// Link between a character and an anime or manga it appears in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppearanceRecord {
    pub character_id: i64,
    /// `Anime` or `Manga`
    pub work_kind: EntityKind,
    pub work_id: i64,
    /// Role label such as "Main" or "Supporting"
    pub role: String,
}

/// Columns common to every entity table, for reads
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySummary {
    pub kind: EntityKind,
    pub mal_id: i64,
    /// Title for works, name for characters
    pub display_name: String,
    pub favorites: i64,
    pub raw: Value,
    pub created_at: String,
    pub updated_at: String,
}
