//! Storage traits and error types
//!
//! This module defines the trait interface for the relational mirror and the
//! error type shared by snapshots and mirror backends.

use crate::model::{ListingDetail, Location};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupt snapshot {path}: {reason}")]
    CorruptSnapshot { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for relational mirror backends
///
/// A mirror holds one row per listing keyed by its derived id. Writing a listing
/// whose id already exists replaces the row; it is never an error.
pub trait Mirror {
    // ===== Listings =====

    /// Upserts one page batch atomically
    ///
    /// Either every listing in `listings` is written or none is.
    ///
    /// # Arguments
    ///
    /// * `location` - Name of the location the batch belongs to
    /// * `page` - 1-based listing page the batch came from
    /// * `listings` - The enriched records
    ///
    /// # Returns
    ///
    /// The number of rows written
    fn upsert_listings(
        &mut self,
        location: &str,
        page: u32,
        listings: &[ListingDetail],
    ) -> StorageResult<usize>;

    /// Gets a listing by its derived id
    fn get_listing(&self, id: &str) -> StorageResult<Option<ListingDetail>>;

    /// Counts all mirrored listings
    fn count_listings(&self) -> StorageResult<u64>;

    // ===== Locations =====

    /// Inserts or replaces a resolved location, keyed by name
    fn upsert_location(&mut self, location: &Location) -> StorageResult<()>;

    /// Loads every resolved location, ordered by name
    fn load_locations(&self) -> StorageResult<Vec<Location>>;
}
