//! Dinescout: a resumable restaurant-listing harvester
//!
//! This crate resolves location names to listing scopes on a JavaScript-rendered
//! travel site, paginates through the restaurant results, enriches every listing
//! from its detail page, and persists each page batch as a snapshot file mirrored
//! into SQLite. Completed batches are never fetched twice.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod model;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for crawl operations
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Request to {url} failed with status {status}")]
    Request { url: String, status: u16 },

    #[error("HTTP error for {url}: {source}")]
    Transport { url: String, source: reqwest::Error },

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Page {url} never satisfied its wait conditions after {reloads} reload(s)")]
    RenderTimeout { url: String, reloads: u32 },

    #[error("Browser error for {url}: {message}")]
    Browser { url: String, message: String },

    #[error("Failed to launch browser: {0}")]
    BrowserLaunch(String),

    #[error("Extraction error: {0}")]
    Extraction(#[from] extract::ExtractionError),

    #[error("{target}: gave up after {attempts} attempt(s): {last}")]
    RetryExhausted {
        target: String,
        attempts: u32,
        last: Box<ScrapeError>,
    },

    #[error("Persistence error: {0}")]
    Persistence(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScrapeError {
    /// Returns true if the error must abort the whole run
    ///
    /// Only the inability to launch a browser session qualifies: without it no
    /// listing scope can be opened, so continuing with other locations is pointless.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::BrowserLaunch(_) => true,
            Self::RetryExhausted { last, .. } => last.is_fatal(),
            _ => false,
        }
    }

    /// Number of attempts made before giving up, if this error came from the retry envelope
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::RetryExhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector in config: {0}")]
    InvalidSelector(String),
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use model::{derive_id, ListingDetail, ListingSummary, Location};
pub use state::{CrawlState, LocationOutcome, RunSummary};
