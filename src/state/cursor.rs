//! Discovery cursor
//!
//! A cursor records the last catalog page whose listing was fetched and
//! handed to hydration. It is written before that page's hydration has
//! finished, so a crash can lose the in-flight batch; those ids are only
//! picked up again by an incremental refresh.

/// Page discovery starts from when no cursor exists
pub const FIRST_PAGE: u32 = 1;

/// A persisted cursor row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlCursor {
    /// Cursor key, e.g. `last_anime_page`
    pub key: String,

    /// Stored value; a page number for every cursor this crate writes
    pub value: String,

    /// When the cursor was last written (RFC 3339)
    pub updated_at: String,
}

impl CrawlCursor {
    /// Returns the stored page number, if the value parses as one
    pub fn page(&self) -> Option<u32> {
        self.value.trim().parse().ok().filter(|page| *page >= FIRST_PAGE)
    }

    /// Page a discovery run should start from given an optional cursor
    ///
    /// Resuming re-fetches the last completed page rather than the one after
    /// it. Re-listing a page is harmless because hydration is idempotent.
    pub fn start_page(cursor: Option<&CrawlCursor>) -> u32 {
        match cursor {
            Some(cursor) => match cursor.page() {
                Some(page) => page,
                None => {
                    tracing::warn!(
                        "Ignoring unparsable cursor {}={:?}, starting from page {}",
                        cursor.key,
                        cursor.value,
                        FIRST_PAGE
                    );
                    FIRST_PAGE
                }
            },
            None => FIRST_PAGE,
        }
    }
}
