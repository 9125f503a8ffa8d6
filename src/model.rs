//! Listing data model
//!
//! `Location` is resolved once per crawl target, `ListingSummary` lives only
//! between a listing page and its detail enrichment, and `ListingDetail` is the
//! durable record written to snapshots and the relational mirror.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Sentinel for an unknown rating
pub const UNKNOWN_RATING: f64 = -1.0;

/// Sentinel for an unknown review count
pub const UNKNOWN_REVIEW_COUNT: i64 = -1;

/// Each id component is the SHA-256 digest reduced modulo this value
const ID_COMPONENT_MODULUS: u64 = 100_000_000;

/// Listing root URLs for the three categories a location exposes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryUrls {
    pub food: String,
    pub fun: String,
    pub lodging: String,
}

/// A resolved search scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub name: String,
    pub url: String,
    pub listing_url: CategoryUrls,
    pub place_type: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// One row discovered on a listing page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingSummary {
    pub detail_url: String,
    #[serde(default)]
    pub images: Vec<String>,
}

/// The durable listing record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingDetail {
    pub id: String,
    pub name: String,
    pub detail_url: String,
    pub rating: f64,
    pub review_count: i64,
    pub price_tier: String,
    pub tags: Vec<String>,
    pub images: Vec<String>,
    pub address: String,
    pub phone: String,
}

impl ListingDetail {
    /// Creates a record seeded from a summary, every enrichable field at its sentinel
    pub fn from_summary(summary: &ListingSummary) -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            detail_url: summary.detail_url.clone(),
            rating: UNKNOWN_RATING,
            review_count: UNKNOWN_REVIEW_COUNT,
            price_tier: String::new(),
            tags: Vec::new(),
            images: summary.images.clone(),
            address: String::new(),
            phone: String::new(),
        }
    }

    /// Recomputes `id` from the current address and name
    pub fn assign_id(&mut self) {
        self.id = derive_id(&self.address, &self.name);
    }

    /// Returns true if `id` matches the hash of the current address and name
    pub fn has_consistent_id(&self) -> bool {
        self.id == derive_id(&self.address, &self.name)
    }
}

/// Derives the stable identifier for a listing from its address and name
///
/// The result is independent of the listing's URL and of scrape order, so
/// re-scraping the same place always lands on the same row.
pub fn derive_id(address: &str, name: &str) -> String {
    [address, name].iter().map(|part| hash_component(part)).collect()
}

fn hash_component(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    let reduced = digest
        .iter()
        .fold(0u64, |acc, byte| (acc * 256 + u64::from(*byte)) % ID_COMPONENT_MODULUS);
    reduced.to_string()
}
