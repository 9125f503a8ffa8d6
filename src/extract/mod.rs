//! Page extraction: raw page content in, typed records out
//!
//! Every function here is pure. Structural mismatches surface as an
//! [`ExtractionError`] naming the missing field instead of a half-empty record;
//! the one deliberate exception is [`enrich_listing`], which degrades
//! individual field groups to their sentinel defaults.

mod detail;
mod embedded;
mod listing;
mod location;

pub use detail::{
    enrich_listing, Enrichment, FieldFailure, IDENTITY_KEY, PHOTOS_KEY, REVIEW_SUMMARY_KEY,
    TAGS_KEY,
};
pub use embedded::{extract_embedded_state, find_key, EmbeddedState};
pub use listing::{parse_listing_page, parse_page_meta, PageMeta};
pub use location::{parse_location_response, search_request};

use scraper::Selector;
use thiserror::Error;

/// Errors raised when fetched content does not have the expected structure
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractionError {
    #[error("missing field `{0}`")]
    Missing(String),

    #[error("field `{field}` has unexpected shape: {detail}")]
    Shape { field: String, detail: String },

    #[error("no embedded state entry contains `{0}`")]
    NotFound(String),

    #[error("embedded state is malformed: {0}")]
    MalformedJson(String),

    #[error("invalid selector `{0}`")]
    Selector(String),
}

impl ExtractionError {
    pub(crate) fn shape(field: &str, detail: impl Into<String>) -> Self {
        Self::Shape {
            field: field.to_string(),
            detail: detail.into(),
        }
    }
}

/// Parses a CSS selector, mapping failures to an extraction error
pub(crate) fn selector(css: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(css).map_err(|_| ExtractionError::Selector(css.to_string()))
}
