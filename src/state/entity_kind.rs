//! Entity kind definitions
//!
//! Each kind maps to one upstream endpoint family, one local table and one
//! discovery cursor. Dispatch on kind is always a `match`, never a lookup.

use crate::EtlError;
use std::fmt;
use std::str::FromStr;

/// An upstream entity kind mirrored by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Anime,
    Manga,
    Character,
}

impl EntityKind {
    /// All kinds, in the order status reports list them
    pub const ALL: [EntityKind; 3] = [Self::Anime, Self::Manga, Self::Character];

    /// Short lowercase name used in logs and cursor keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anime => "anime",
            Self::Manga => "manga",
            Self::Character => "character",
        }
    }

    /// Path segment of the upstream catalog and detail endpoints
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Anime => "anime",
            Self::Manga => "manga",
            Self::Character => "characters",
        }
    }

    /// Name of the local table holding records of this kind
    pub fn table(&self) -> &'static str {
        match self {
            Self::Anime => "anime",
            Self::Manga => "manga",
            Self::Character => "characters",
        }
    }

    /// Key under which the discovery cursor for this kind is stored
    pub fn cursor_key(&self) -> String {
        format!("last_{}_page", self.as_str())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = EtlError;

    /// Accepts both the singular kind name and the plural endpoint name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anime" => Ok(Self::Anime),
            "manga" => Ok(Self::Manga),
            "character" | "characters" => Ok(Self::Character),
            other => Err(EtlError::UnknownKind(other.to_string())),
        }
    }
}
