//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the catalog database.
//! List-valued columns hold JSON arrays; JSON columns hold serialized objects.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Anime, keyed on the upstream id
CREATE TABLE IF NOT EXISTS anime (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mal_id INTEGER NOT NULL UNIQUE,
    title TEXT NOT NULL,
    title_english TEXT,
    title_japanese TEXT,
    url TEXT,
    images_json TEXT NOT NULL DEFAULT '{}',
    synopsis TEXT,
    episodes INTEGER,
    status TEXT,
    type TEXT,
    source TEXT,
    rating TEXT,
    score REAL,
    rank INTEGER,
    popularity INTEGER,
    favorites INTEGER NOT NULL DEFAULT 0,
    genres TEXT NOT NULL DEFAULT '[]',
    studios TEXT NOT NULL DEFAULT '[]',
    season TEXT,
    year INTEGER,
    duration TEXT,
    raw_json TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_anime_updated ON anime(updated_at);

-- Manga, keyed on the upstream id
CREATE TABLE IF NOT EXISTS manga (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mal_id INTEGER NOT NULL UNIQUE,
    title TEXT NOT NULL,
    title_english TEXT,
    title_japanese TEXT,
    url TEXT,
    images_json TEXT NOT NULL DEFAULT '{}',
    synopsis TEXT,
    chapters INTEGER,
    volumes INTEGER,
    status TEXT,
    type TEXT,
    score REAL,
    rank INTEGER,
    popularity INTEGER,
    favorites INTEGER NOT NULL DEFAULT 0,
    genres TEXT NOT NULL DEFAULT '[]',
    authors TEXT NOT NULL DEFAULT '[]',
    serialization TEXT,
    year INTEGER,
    raw_json TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_manga_updated ON manga(updated_at);

-- Characters, keyed on the upstream id
CREATE TABLE IF NOT EXISTS characters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mal_id INTEGER NOT NULL UNIQUE,
    name TEXT NOT NULL,
    name_kanji TEXT,
    url TEXT,
    about TEXT,
    nicknames TEXT NOT NULL DEFAULT '[]',
    images_json TEXT NOT NULL DEFAULT '{}',
    favorites INTEGER NOT NULL DEFAULT 0,
    raw_json TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_characters_updated ON characters(updated_at);

-- Character appearances in anime
CREATE TABLE IF NOT EXISTS character_anime (
    character_id INTEGER NOT NULL REFERENCES characters(mal_id),
    anime_id INTEGER NOT NULL REFERENCES anime(mal_id),
    role TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (character_id, anime_id)
);

-- Character appearances in manga
CREATE TABLE IF NOT EXISTS character_manga (
    character_id INTEGER NOT NULL REFERENCES characters(mal_id),
    manga_id INTEGER NOT NULL REFERENCES manga(mal_id),
    role TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (character_id, manga_id)
);

-- Discovery cursors and other crawler bookkeeping
CREATE TABLE IF NOT EXISTS crawler_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
