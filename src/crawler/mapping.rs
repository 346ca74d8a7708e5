//! Field mapping from upstream entity payloads to storage records
//!
//! Defaulting rules shared by every kind:
//! - missing or empty strings become `None` (titles and names fall back to "")
//! - missing numbers become `None`, except `favorites` which becomes 0
//! - missing lists become empty lists
//! - missing `images` becomes `{}`
//!
//! The untouched payload is kept as the record's raw snapshot.

use crate::state::EntityKind;
use crate::storage::{AnimeRecord, CharacterRecord, MangaRecord, WorkStub};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct NamedRef {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnimePayload {
    mal_id: i64,
    title: Option<String>,
    title_english: Option<String>,
    title_japanese: Option<String>,
    url: Option<String>,
    images: Option<Value>,
    synopsis: Option<String>,
    episodes: Option<i64>,
    status: Option<String>,
    #[serde(rename = "type")]
    anime_type: Option<String>,
    source: Option<String>,
    rating: Option<String>,
    score: Option<f64>,
    rank: Option<i64>,
    popularity: Option<i64>,
    favorites: Option<i64>,
    genres: Option<Vec<NamedRef>>,
    studios: Option<Vec<NamedRef>>,
    season: Option<String>,
    year: Option<i64>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MangaPayload {
    mal_id: i64,
    title: Option<String>,
    title_english: Option<String>,
    title_japanese: Option<String>,
    url: Option<String>,
    images: Option<Value>,
    synopsis: Option<String>,
    chapters: Option<i64>,
    volumes: Option<i64>,
    status: Option<String>,
    #[serde(rename = "type")]
    manga_type: Option<String>,
    score: Option<f64>,
    rank: Option<i64>,
    popularity: Option<i64>,
    favorites: Option<i64>,
    genres: Option<Vec<NamedRef>>,
    authors: Option<Vec<NamedRef>>,
    serializations: Option<Vec<NamedRef>>,
    published: Option<Published>,
    year: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Published {
    prop: Option<PublishedProp>,
}

#[derive(Debug, Deserialize)]
struct PublishedProp {
    from: Option<DateParts>,
}

#[derive(Debug, Deserialize)]
struct DateParts {
    year: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CharacterPayload {
    mal_id: i64,
    name: Option<String>,
    name_kanji: Option<String>,
    url: Option<String>,
    about: Option<String>,
    nicknames: Option<Vec<String>>,
    images: Option<Value>,
    favorites: Option<i64>,
}

/// A work a character appears in, as listed on the character payload
#[derive(Debug, Clone, PartialEq)]
pub struct Appearance {
    /// `Anime` or `Manga`
    pub work_kind: EntityKind,
    pub stub: WorkStub,
    pub role: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn images_or_empty(images: Option<Value>) -> Value {
    images.unwrap_or_else(|| json!({}))
}

fn names(refs: Option<Vec<NamedRef>>) -> Vec<String> {
    refs.unwrap_or_default()
        .into_iter()
        .filter_map(|r| non_empty(r.name))
        .collect()
}

pub fn map_anime(data: &Value) -> Result<AnimeRecord, serde_json::Error> {
    let p: AnimePayload = serde_json::from_value(data.clone())?;

    Ok(AnimeRecord {
        mal_id: p.mal_id,
        title: p.title.unwrap_or_default(),
        title_english: non_empty(p.title_english),
        title_japanese: non_empty(p.title_japanese),
        url: non_empty(p.url),
        images: images_or_empty(p.images),
        synopsis: non_empty(p.synopsis),
        episodes: p.episodes,
        status: non_empty(p.status),
        anime_type: non_empty(p.anime_type),
        source: non_empty(p.source),
        rating: non_empty(p.rating),
        score: p.score,
        rank: p.rank,
        popularity: p.popularity,
        favorites: p.favorites.unwrap_or(0),
        genres: names(p.genres),
        studios: names(p.studios),
        season: non_empty(p.season),
        year: p.year,
        duration: non_empty(p.duration),
        raw: data.clone(),
    })
}

pub fn map_manga(data: &Value) -> Result<MangaRecord, serde_json::Error> {
    let p: MangaPayload = serde_json::from_value(data.clone())?;

    let serializations = names(p.serializations);
    let serialization = if serializations.is_empty() {
        None
    } else {
        Some(serializations.join(", "))
    };

    // Start year of publication, else the top-level year
    let published_year = p
        .published
        .and_then(|published| published.prop)
        .and_then(|prop| prop.from)
        .and_then(|from| from.year);

    Ok(MangaRecord {
        mal_id: p.mal_id,
        title: p.title.unwrap_or_default(),
        title_english: non_empty(p.title_english),
        title_japanese: non_empty(p.title_japanese),
        url: non_empty(p.url),
        images: images_or_empty(p.images),
        synopsis: non_empty(p.synopsis),
        chapters: p.chapters,
        volumes: p.volumes,
        status: non_empty(p.status),
        manga_type: non_empty(p.manga_type),
        score: p.score,
        rank: p.rank,
        popularity: p.popularity,
        favorites: p.favorites.unwrap_or(0),
        genres: names(p.genres),
        authors: names(p.authors),
        serialization,
        year: published_year.or(p.year),
        raw: data.clone(),
    })
}

pub fn map_character(data: &Value) -> Result<CharacterRecord, serde_json::Error> {
    let p: CharacterPayload = serde_json::from_value(data.clone())?;

    Ok(CharacterRecord {
        mal_id: p.mal_id,
        name: p.name.unwrap_or_default(),
        name_kanji: non_empty(p.name_kanji),
        url: non_empty(p.url),
        about: non_empty(p.about),
        nicknames: p.nicknames.unwrap_or_default(),
        images: images_or_empty(p.images),
        favorites: p.favorites.unwrap_or(0),
        raw: data.clone(),
    })
}

/// Collects the anime and manga appearances of a character payload
///
/// Entries without a nested work id are skipped. Each stub keeps the nested
/// work object as its raw snapshot.
pub fn character_appearances(data: &Value) -> Vec<Appearance> {
    let mut appearances = Vec::new();

    for work_kind in [EntityKind::Anime, EntityKind::Manga] {
        let field = work_kind.as_str();
        let Some(items) = data.get(field).and_then(Value::as_array) else {
            continue;
        };

        for item in items {
            let Some(work) = item.get(field).filter(|w| w.is_object()) else {
                continue;
            };
            let Some(mal_id) = work.get("mal_id").and_then(Value::as_i64) else {
                continue;
            };

            let stub = WorkStub {
                mal_id,
                title: work
                    .get("title")
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
                url: work
                    .get("url")
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
                images: work.get("images").filter(|v| !v.is_null()).cloned(),
                raw: work.clone(),
            };

            appearances.push(Appearance {
                work_kind,
                stub,
                role: item
                    .get("role")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            });
        }
    }

    appearances
}
