//! Upstream response envelopes
//!
//! Only the parts the pipeline reads are typed here. Entity bodies stay as
//! `serde_json::Value` so the raw snapshot keeps every field the upstream
//! sends; field mapping happens in `mapping`.

use serde::Deserialize;
use serde_json::Value;

/// One page of a catalog listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogPage {
    #[serde(default)]
    pub data: Vec<CatalogStub>,

    #[serde(default)]
    pub pagination: Pagination,
}

impl CatalogPage {
    /// Ids listed on this page, in listing order
    pub fn ids(&self) -> Vec<i64> {
        self.data.iter().map(|stub| stub.mal_id).collect()
    }

    pub fn has_next_page(&self) -> bool {
        self.pagination.has_next_page
    }
}

/// A catalog entry; everything but the id is ignored
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogStub {
    pub mal_id: i64,
}

/// Paging block of a catalog listing
///
/// A missing block reads as "no next page" so a malformed listing ends the
/// crawl instead of looping.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub has_next_page: bool,

    #[serde(default)]
    pub current_page: Option<u32>,

    #[serde(default)]
    pub last_visible_page: Option<u32>,
}

/// Body of a `/{kind}/{id}/full` response
#[derive(Debug, Clone, Deserialize)]
pub struct DetailEnvelope {
    pub data: Value,
}
