//! Flattening page snapshots into a single JSON Lines file
//!
//! The export is meant for bulk import into an external search index: one
//! `ListingDetail` per line, each id at most once.

use crate::model::ListingDetail;
use crate::storage::{read_snapshot, SnapshotDir};
use crate::Result;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Default file name of the export, placed in the data directory
pub const EXPORT_FILE: &str = "all.jsonl";

/// Counters reported after an export
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportStats {
    /// Snapshot files read
    pub files: usize,

    /// Lines written
    pub records: usize,

    /// Records dropped because a later snapshot had the same id
    pub duplicates: usize,
}

/// Returns the default export path for a data directory
pub fn default_export_path(snapshots: &SnapshotDir) -> PathBuf {
    snapshots.root().join(EXPORT_FILE)
}

/// Writes every snapshotted listing to `dest`, one JSON object per line
///
/// Snapshots are read in location then page order. When the same id appears
/// more than once the last occurrence wins but keeps the position of the first.
pub fn export_jsonl(snapshots: &SnapshotDir, dest: &Path) -> Result<ExportStats> {
    let files = snapshots.page_files()?;
    let mut stats = ExportStats {
        files: files.len(),
        ..ExportStats::default()
    };

    let mut records: Vec<ListingDetail> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for path in &files {
        for listing in read_snapshot(path)? {
            match positions.get(&listing.id) {
                Some(&index) => {
                    records[index] = listing;
                    stats.duplicates += 1;
                }
                None => {
                    positions.insert(listing.id.clone(), records.len());
                    records.push(listing);
                }
            }
        }
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = dest.with_extension("jsonl.tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        for listing in &records {
            serde_json::to_writer(&mut writer, listing)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp, dest)?;

    stats.records = records.len();
    tracing::info!(
        path = %dest.display(),
        files = stats.files,
        records = stats.records,
        duplicates = stats.duplicates,
        "Exported listings"
    );
    Ok(stats)
}
