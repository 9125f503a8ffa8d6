//! Crawler module for fetching and orchestrating listing crawls
//!
//! This module contains the core crawling logic, including:
//! - Bounded retry with a fixed delay around every network-bound step
//! - A rate-limited HTTP client with a rotatable identity
//! - Headless-browser rendering for JavaScript-gated listing pages
//! - Overall crawl coordination and resume decisions

mod client;
mod coordinator;
mod renderer;
mod retry;

pub use client::{build_http_client, Identity, RateLimitedClient};
pub use coordinator::Orchestrator;
pub use renderer::{is_xpath, ChromiumRenderer, Renderer};
pub use retry::Retry;

use crate::config::Config;
use crate::state::RunSummary;
use crate::storage::{open_mirror, RecordStore, SqliteMirror};
use crate::Result;
use std::path::Path;

/// Runs a complete crawl with the Chromium renderer and the SQLite mirror
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the mirror database (retrying while it is locked)
/// 2. Resolve every location name
/// 3. Crawl each resolved location, skipping committed pages
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `names` - Location names to crawl
/// * `max_pages` - Page budget per location; zero or negative means all pages
pub async fn crawl(config: Config, names: &[String], max_pages: i64) -> Result<RunSummary> {
    let store = open_store(&config)?;
    let renderer = ChromiumRenderer::new(config.browser.clone());
    let mut orchestrator = Orchestrator::new(config, renderer, store)?;
    orchestrator.run(names, max_pages).await
}

/// Opens the record store described by the output configuration
pub fn open_store(config: &Config) -> Result<RecordStore<SqliteMirror>> {
    let retry = Retry::from_config(&config.crawler);
    let db_path = Path::new(&config.output.database_path);

    let mirror = retry.run_blocking("open mirror database", || Ok(open_mirror(db_path)?))?;
    Ok(RecordStore::new(&config.output.data_dir, mirror))
}
