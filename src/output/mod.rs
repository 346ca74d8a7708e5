//! Output module for reporting catalog state
//!
//! This module handles:
//! - Collecting record, appearance and cursor statistics from storage
//! - Printing them for the `status` command

pub mod stats;

pub use stats::{load_statistics, print_statistics, CatalogStatistics};
