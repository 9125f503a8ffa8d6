//! Per-page snapshot files and scope manifests
//!
//! Layout under the data directory:
//!
//! ```text
//! <data-dir>/<location-slug>/scope.json
//! <data-dir>/<location-slug>/page_<n>.json
//! ```
//!
//! A page file's presence is the completion marker for that page, so files
//! are written to a temporary name and renamed into place.

use crate::model::ListingDetail;
use crate::storage::traits::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use std::fs;
use std::path::{Path, PathBuf};

const SCOPE_FILE: &str = "scope.json";
const PAGE_PREFIX: &str = "page_";
const INDENT: &[u8] = b"    ";

/// Pagination facts learned from a location's first listing page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeManifest {
    pub total_results: u32,
    /// Page size, read from the offset in page 1's next link when it has one
    pub results_on_first_page: u32,
    pub total_pages: u32,
    /// Next-page link from page 1, used as the template for later page URLs
    pub next_page: Option<String>,
}

/// Directory of snapshot files, one subdirectory per location
#[derive(Debug, Clone)]
pub struct SnapshotDir {
    root: PathBuf,
}

impl SnapshotDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn page_path(&self, slug: &str, page: u32) -> PathBuf {
        self.root
            .join(slug)
            .join(format!("{}{}.json", PAGE_PREFIX, page))
    }

    pub fn scope_path(&self, slug: &str) -> PathBuf {
        self.root.join(slug).join(SCOPE_FILE)
    }

    /// Returns true if a snapshot for `(slug, page)` exists
    pub fn has_page(&self, slug: &str, page: u32) -> bool {
        self.page_path(slug, page).is_file()
    }

    /// Atomically writes a page batch and returns its path
    pub fn write_page(
        &self,
        slug: &str,
        page: u32,
        listings: &[ListingDetail],
    ) -> StorageResult<PathBuf> {
        let path = self.page_path(slug, page);
        write_json_atomic(&path, &listings)?;
        Ok(path)
    }

    pub fn read_page(&self, slug: &str, page: u32) -> StorageResult<Vec<ListingDetail>> {
        read_snapshot(&self.page_path(slug, page))
    }

    /// Deletes a page snapshot; a missing file is not an error
    pub fn remove_page(&self, slug: &str, page: u32) -> StorageResult<()> {
        match fs::remove_file(self.page_path(slug, page)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write_scope(&self, slug: &str, manifest: &ScopeManifest) -> StorageResult<()> {
        write_json_atomic(&self.scope_path(slug), manifest)
    }

    pub fn read_scope(&self, slug: &str) -> StorageResult<Option<ScopeManifest>> {
        let path = self.scope_path(slug);
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| corrupt(&path, e))
    }

    /// Lists every page snapshot, ordered by location then page number
    pub fn page_files(&self) -> StorageResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        if !self.root.is_dir() {
            return Ok(files);
        }

        let mut locations: Vec<PathBuf> = fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_dir())
            .collect();
        locations.sort();

        for dir in locations {
            let mut pages: Vec<(u32, PathBuf)> = fs::read_dir(&dir)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter_map(|path| page_number(&path).map(|n| (n, path)))
                .collect();
            pages.sort_by_key(|(n, _)| *n);
            files.extend(pages.into_iter().map(|(_, path)| path));
        }

        Ok(files)
    }
}

/// Reads one page snapshot file
pub fn read_snapshot(path: &Path) -> StorageResult<Vec<ListingDetail>> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| corrupt(path, e))
}

fn page_number(path: &Path) -> Option<u32> {
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        return None;
    }
    path.file_stem()?
        .to_str()?
        .strip_prefix(PAGE_PREFIX)?
        .parse()
        .ok()
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut buf = Vec::new();
    let mut ser =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(INDENT));
    value.serialize(&mut ser)?;
    buf.push(b'\n');

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &buf)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn corrupt(path: &Path, err: serde_json::Error) -> StorageError {
    StorageError::CorruptSnapshot {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}
