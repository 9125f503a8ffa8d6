//! Output module for exporting and reporting crawl results
//!
//! This module handles:
//! - Exporting every snapshot as one JSON Lines file for external indexing
//! - Printing run summaries and resolved locations

mod jsonl;
mod report;

pub use jsonl::{default_export_path, export_jsonl, ExportStats, EXPORT_FILE};
pub use report::{format_locations, format_run_summary, print_locations, print_run_summary};
