//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlState`: where a location is in the resolve, paginate, enrich, checkpoint cycle
//! - `LocationOutcome` / `RunSummary`: the terminal result reported per location

mod crawl_state;

// Re-export main types
pub use crawl_state::{CrawlState, LocationOutcome, PageTally, RunSummary};
