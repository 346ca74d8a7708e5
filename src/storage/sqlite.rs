//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::{CrawlCursor, EntityKind};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    AnimeRecord, AppearanceRecord, CharacterRecord, EntitySummary, MangaRecord, WorkStub,
};
use crate::EtlError;
use chrono::{SecondsFormat, Utc};
use rusqlite::{ffi, params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Storage handle shared between hydration tasks
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(EtlError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, EtlError> {
        let conn = init_database(path)?;
        conn.execute_batch(
            "
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;
        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, EtlError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Wraps this storage for sharing between tasks
    pub fn into_shared(self) -> SharedStorage {
        Arc::new(Mutex::new(self))
    }

    /// Overrides the `updated_at` of a record
    #[cfg(test)]
    pub(crate) fn set_updated_at(
        &mut self,
        kind: EntityKind,
        mal_id: i64,
        updated_at: &str,
    ) -> StorageResult<()> {
        self.conn.execute(
            &format!("UPDATE {} SET updated_at = ?1 WHERE mal_id = ?2", kind.table()),
            params![updated_at, mal_id],
        )?;
        Ok(())
    }
}

/// Current time as a fixed-width RFC 3339 string
///
/// Fixed microsecond precision keeps lexical and chronological order equal,
/// which `stalest_ids` relies on.
fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn to_json_text<T: serde::Serialize>(value: &T) -> StorageResult<String> {
    Ok(serde_json::to_string(value)?)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Returns the appearance table and its work column for a work kind
fn appearance_table(work_kind: EntityKind) -> StorageResult<(&'static str, &'static str)> {
    match work_kind {
        EntityKind::Anime => Ok(("character_anime", "anime_id")),
        EntityKind::Manga => Ok(("character_manga", "manga_id")),
        EntityKind::Character => Err(StorageError::Unsupported {
            kind: work_kind,
            operation: "appearance",
        }),
    }
}

impl Storage for SqliteStorage {
    // ===== Entity Upserts =====

    fn upsert_anime(&mut self, record: &AnimeRecord) -> StorageResult<()> {
        let now = now_timestamp();
        self.conn.execute(
            "INSERT INTO anime (mal_id, title, title_english, title_japanese, url, images_json,
             synopsis, episodes, status, type, source, rating, score, rank, popularity, favorites,
             genres, studios, season, year, duration, raw_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
             ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?23)
             ON CONFLICT(mal_id) DO UPDATE SET
             title = excluded.title, title_english = excluded.title_english,
             title_japanese = excluded.title_japanese, url = excluded.url,
             images_json = excluded.images_json, synopsis = excluded.synopsis,
             episodes = excluded.episodes, status = excluded.status, type = excluded.type,
             source = excluded.source, rating = excluded.rating, score = excluded.score,
             rank = excluded.rank, popularity = excluded.popularity,
             favorites = excluded.favorites, genres = excluded.genres,
             studios = excluded.studios, season = excluded.season, year = excluded.year,
             duration = excluded.duration, raw_json = excluded.raw_json,
             updated_at = excluded.updated_at",
            params![
                record.mal_id,
                record.title,
                record.title_english,
                record.title_japanese,
                record.url,
                to_json_text(&record.images)?,
                record.synopsis,
                record.episodes,
                record.status,
                record.anime_type,
                record.source,
                record.rating,
                record.score,
                record.rank,
                record.popularity,
                record.favorites,
                to_json_text(&record.genres)?,
                to_json_text(&record.studios)?,
                record.season,
                record.year,
                record.duration,
                to_json_text(&record.raw)?,
                now,
            ],
        )?;
        Ok(())
    }

    fn upsert_manga(&mut self, record: &MangaRecord) -> StorageResult<()> {
        let now = now_timestamp();
        self.conn.execute(
            "INSERT INTO manga (mal_id, title, title_english, title_japanese, url, images_json,
             synopsis, chapters, volumes, status, type, score, rank, popularity, favorites,
             genres, authors, serialization, year, raw_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
             ?17, ?18, ?19, ?20, ?21, ?21)
             ON CONFLICT(mal_id) DO UPDATE SET
             title = excluded.title, title_english = excluded.title_english,
             title_japanese = excluded.title_japanese, url = excluded.url,
             images_json = excluded.images_json, synopsis = excluded.synopsis,
             chapters = excluded.chapters, volumes = excluded.volumes,
             status = excluded.status, type = excluded.type, score = excluded.score,
             rank = excluded.rank, popularity = excluded.popularity,
             favorites = excluded.favorites, genres = excluded.genres,
             authors = excluded.authors, serialization = excluded.serialization,
             year = excluded.year, raw_json = excluded.raw_json,
             updated_at = excluded.updated_at",
            params![
                record.mal_id,
                record.title,
                record.title_english,
                record.title_japanese,
                record.url,
                to_json_text(&record.images)?,
                record.synopsis,
                record.chapters,
                record.volumes,
                record.status,
                record.manga_type,
                record.score,
                record.rank,
                record.popularity,
                record.favorites,
                to_json_text(&record.genres)?,
                to_json_text(&record.authors)?,
                record.serialization,
                record.year,
                to_json_text(&record.raw)?,
                now,
            ],
        )?;
        Ok(())
    }

    fn upsert_character(&mut self, record: &CharacterRecord) -> StorageResult<()> {
        let now = now_timestamp();
        self.conn.execute(
            "INSERT INTO characters (mal_id, name, name_kanji, url, about, nicknames,
             images_json, favorites, raw_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
             ON CONFLICT(mal_id) DO UPDATE SET
             name = excluded.name, name_kanji = excluded.name_kanji, url = excluded.url,
             about = excluded.about, nicknames = excluded.nicknames,
             images_json = excluded.images_json, favorites = excluded.favorites,
             raw_json = excluded.raw_json, updated_at = excluded.updated_at",
            params![
                record.mal_id,
                record.name,
                record.name_kanji,
                record.url,
                record.about,
                to_json_text(&record.nicknames)?,
                to_json_text(&record.images)?,
                record.favorites,
                to_json_text(&record.raw)?,
                now,
            ],
        )?;
        Ok(())
    }

    fn upsert_work_stub(&mut self, kind: EntityKind, stub: &WorkStub) -> StorageResult<()> {
        if kind == EntityKind::Character {
            return Err(StorageError::Unsupported {
                kind,
                operation: "work stub",
            });
        }

        let now = now_timestamp();
        let images = stub.images.as_ref().map(to_json_text).transpose()?;

        // Absent stub fields keep whatever the row already holds
        self.conn.execute(
            &format!(
                "INSERT INTO {} (mal_id, title, url, images_json, raw_json, created_at, updated_at)
                 VALUES (?1, COALESCE(?2, ''), ?3, COALESCE(?4, '{{}}'), ?5, ?6, ?6)
                 ON CONFLICT(mal_id) DO UPDATE SET
                 title = COALESCE(?2, title), url = COALESCE(?3, url),
                 images_json = COALESCE(?4, images_json)",
                kind.table()
            ),
            params![
                stub.mal_id,
                stub.title,
                stub.url,
                images,
                to_json_text(&stub.raw)?,
                now,
            ],
        )?;
        Ok(())
    }

    // ===== Entity Reads =====

    fn get_entity(&self, kind: EntityKind, mal_id: i64) -> StorageResult<Option<EntitySummary>> {
        let name_column = match kind {
            EntityKind::Character => "name",
            EntityKind::Anime | EntityKind::Manga => "title",
        };

        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT mal_id, {}, favorites, raw_json, created_at, updated_at
                     FROM {} WHERE mal_id = ?1",
                    name_column,
                    kind.table()
                ),
                params![mal_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((mal_id, display_name, favorites, raw, created_at, updated_at)) => {
                Ok(Some(EntitySummary {
                    kind,
                    mal_id,
                    display_name,
                    favorites,
                    raw: serde_json::from_str(&raw)?,
                    created_at,
                    updated_at,
                }))
            }
            None => Ok(None),
        }
    }

    fn count_entities(&self, kind: EntityKind) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", kind.table()),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn stalest_ids(&self, kind: EntityKind, limit: u64) -> StorageResult<Vec<i64>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT mal_id FROM {} ORDER BY updated_at ASC, mal_id ASC LIMIT ?1",
            kind.table()
        ))?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let ids = stmt
            .query_map(params![limit], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;

        Ok(ids)
    }

    // ===== Appearances =====

    fn insert_appearance(&mut self, appearance: &AppearanceRecord) -> StorageResult<()> {
        let (table, work_column) = appearance_table(appearance.work_kind)?;

        let result = self.conn.execute(
            &format!(
                "INSERT INTO {} (character_id, {}, role, created_at) VALUES (?1, ?2, ?3, ?4)",
                table, work_column
            ),
            params![
                appearance.character_id,
                appearance.work_id,
                appearance.role,
                now_timestamp()
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StorageError::ConstraintViolation(format!(
                "character {} already linked to {} {}",
                appearance.character_id, appearance.work_kind, appearance.work_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn get_appearances(&self, character_id: i64) -> StorageResult<Vec<AppearanceRecord>> {
        let mut appearances = Vec::new();

        for work_kind in [EntityKind::Anime, EntityKind::Manga] {
            let (table, work_column) = appearance_table(work_kind)?;
            let mut stmt = self.conn.prepare(&format!(
                "SELECT character_id, {}, role FROM {} WHERE character_id = ?1 ORDER BY {}",
                work_column, table, work_column
            ))?;

            let rows = stmt
                .query_map(params![character_id], |row| {
                    Ok(AppearanceRecord {
                        character_id: row.get(0)?,
                        work_kind,
                        work_id: row.get(1)?,
                        role: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            appearances.extend(rows);
        }

        Ok(appearances)
    }

    fn count_appearances(&self, work_kind: EntityKind) -> StorageResult<u64> {
        let (table, _) = appearance_table(work_kind)?;
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })?;
        Ok(count as u64)
    }

    // ===== Discovery Cursors =====

    fn get_cursor(&self, kind: EntityKind) -> StorageResult<Option<CrawlCursor>> {
        let cursor = self
            .conn
            .query_row(
                "SELECT key, value, updated_at FROM crawler_meta WHERE key = ?1",
                params![kind.cursor_key()],
                |row| {
                    Ok(CrawlCursor {
                        key: row.get(0)?,
                        value: row.get(1)?,
                        updated_at: row.get(2)?,
                    })
                },
            )
            .optional()?;

        Ok(cursor)
    }

    fn set_cursor(&mut self, kind: EntityKind, page: u32) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO crawler_meta (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![kind.cursor_key(), page.to_string(), now_timestamp()],
        )?;
        Ok(())
    }

    fn reset_cursor(&mut self, kind: EntityKind) -> StorageResult<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM crawler_meta WHERE key = ?1",
            params![kind.cursor_key()],
        )?;
        Ok(deleted > 0)
    }

    fn list_cursors(&self) -> StorageResult<Vec<CrawlCursor>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value, updated_at FROM crawler_meta ORDER BY key")?;

        let cursors = stmt
            .query_map([], |row| {
                Ok(CrawlCursor {
                    key: row.get(0)?,
                    value: row.get(1)?,
                    updated_at: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(cursors)
    }
}

/// Opens a database file with the crate's pragmas and schema applied
pub fn init_database(path: &Path) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open(path)?;

    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
    ",
    )?;

    initialize_schema(&conn)?;

    Ok(conn)
}
