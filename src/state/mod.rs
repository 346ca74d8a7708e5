//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `EntityKind`: The closed set of upstream entity kinds the pipeline mirrors
//! - `CrawlCursor`: The persisted "last page processed" marker for discovery

mod cursor;
mod entity_kind;

// Re-export main types
pub use cursor::{CrawlCursor, FIRST_PAGE};
pub use entity_kind::EntityKind;
