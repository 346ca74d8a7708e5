//! Statistics generation from the catalog database
//!
//! This module provides functionality for extracting and displaying
//! catalog statistics from the storage layer.

use crate::state::{CrawlCursor, EntityKind};
use crate::storage::{Storage, StorageResult};
use std::collections::BTreeMap;

/// Catalog statistics summary
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogStatistics {
    /// Stored records per entity kind
    pub entity_counts: BTreeMap<EntityKind, u64>,

    /// Character appearance rows per work kind (anime, manga)
    pub appearance_counts: BTreeMap<EntityKind, u64>,

    /// Every stored discovery cursor
    pub cursors: Vec<CrawlCursor>,
}

impl CatalogStatistics {
    pub fn total_entities(&self) -> u64 {
        self.entity_counts.values().sum()
    }

    pub fn cursor_page(&self, kind: EntityKind) -> Option<u32> {
        let key = kind.cursor_key();
        self.cursors
            .iter()
            .find(|cursor| cursor.key == key)
            .and_then(CrawlCursor::page)
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CatalogStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<CatalogStatistics> {
    let mut entity_counts = BTreeMap::new();
    for kind in EntityKind::ALL {
        entity_counts.insert(kind, storage.count_entities(kind)?);
    }

    let mut appearance_counts = BTreeMap::new();
    for work_kind in [EntityKind::Anime, EntityKind::Manga] {
        appearance_counts.insert(work_kind, storage.count_appearances(work_kind)?);
    }

    let cursors = storage.list_cursors()?;

    Ok(CatalogStatistics {
        entity_counts,
        appearance_counts,
        cursors,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CatalogStatistics) {
    println!("=== Catalog Statistics ===\n");

    println!("Records:");
    for (kind, count) in &stats.entity_counts {
        println!("  {}: {}", kind, count);
    }
    println!("  total: {}", stats.total_entities());
    println!();

    println!("Character Appearances:");
    for (work_kind, count) in &stats.appearance_counts {
        println!("  character_{}: {}", work_kind, count);
    }
    println!();

    println!("Discovery Cursors:");
    if stats.cursors.is_empty() {
        println!("  (none)");
    }
    for cursor in &stats.cursors {
        println!("  {} = {} (updated {})", cursor.key, cursor.value, cursor.updated_at);
    }
}
