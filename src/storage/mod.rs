//! Storage module for persisting crawl output
//!
//! This module handles everything durable:
//! - Per-page snapshot files, whose presence marks a page as complete
//! - Scope manifests that let a resumed crawl skip page 1 entirely
//! - The relational mirror, keyed by each listing's derived id
//!
//! [`RecordStore`] keeps the snapshot and the mirror in agreement.

mod schema;
mod snapshot;
mod sqlite;
mod traits;

pub use snapshot::{read_snapshot, ScopeManifest, SnapshotDir};
pub use sqlite::SqliteMirror;
pub use traits::{Mirror, StorageError, StorageResult};

use crate::model::{ListingDetail, Location};
use std::path::{Path, PathBuf};

/// Opens the SQLite mirror at `path`
pub fn open_mirror(path: &Path) -> StorageResult<SqliteMirror> {
    SqliteMirror::new(path)
}

/// Durable sink for page batches
///
/// A batch is committed by writing its snapshot file and then upserting its
/// rows into the mirror. If the mirror write fails the snapshot is deleted
/// again, so the file never claims a page the mirror does not have.
pub struct RecordStore<M: Mirror> {
    snapshots: SnapshotDir,
    mirror: M,
}

impl<M: Mirror> RecordStore<M> {
    pub fn new(data_dir: impl Into<PathBuf>, mirror: M) -> Self {
        Self {
            snapshots: SnapshotDir::new(data_dir),
            mirror,
        }
    }

    pub fn snapshots(&self) -> &SnapshotDir {
        &self.snapshots
    }

    pub fn mirror(&self) -> &M {
        &self.mirror
    }

    /// Returns true if `(slug, page)` has already been committed
    pub fn is_complete(&self, slug: &str, page: u32) -> bool {
        self.snapshots.has_page(slug, page)
    }

    /// Commits one page batch as a unit
    ///
    /// # Arguments
    ///
    /// * `slug` - Directory name of the location
    /// * `location` - Location name recorded on each mirror row
    /// * `page` - 1-based page number
    /// * `listings` - The enriched batch, possibly empty
    pub fn commit_batch(
        &mut self,
        slug: &str,
        location: &str,
        page: u32,
        listings: &[ListingDetail],
    ) -> StorageResult<usize> {
        let path = self.snapshots.write_page(slug, page, listings)?;

        match self.mirror.upsert_listings(location, page, listings) {
            Ok(written) => {
                tracing::debug!(path = %path.display(), written, "Committed batch");
                Ok(written)
            }
            Err(e) => {
                if let Err(cleanup) = self.snapshots.remove_page(slug, page) {
                    tracing::error!(
                        path = %path.display(),
                        error = %cleanup,
                        "Failed to roll back snapshot after mirror failure"
                    );
                }
                Err(e)
            }
        }
    }

    pub fn scope(&self, slug: &str) -> StorageResult<Option<ScopeManifest>> {
        self.snapshots.read_scope(slug)
    }

    pub fn save_scope(&self, slug: &str, manifest: &ScopeManifest) -> StorageResult<()> {
        self.snapshots.write_scope(slug, manifest)
    }

    pub fn record_location(&mut self, location: &Location) -> StorageResult<()> {
        self.mirror.upsert_location(location)
    }

    /// Every location mirrored so far, ordered by name
    pub fn locations(&self) -> StorageResult<Vec<Location>> {
        self.mirror.load_locations()
    }
}
