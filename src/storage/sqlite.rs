//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Mirror trait.

use crate::model::{CategoryUrls, ListingDetail, Location};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Mirror, StorageError, StorageResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;

/// How long a writer waits on a lock held by another process before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite mirror backend
pub struct SqliteMirror {
    conn: Connection,
}

impl SqliteMirror {
    /// Opens (creating if needed) the mirror database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL lets a second crawl run read and upsert while this one writes
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl Mirror for SqliteMirror {
    // ===== Listings =====

    fn upsert_listings(
        &mut self,
        location: &str,
        page: u32,
        listings: &[ListingDetail],
    ) -> StorageResult<usize> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO listings
                    (id, name, detail_url, rating, review_count, price_tier, tags, images,
                     address, phone, location, page, scraped_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    detail_url = excluded.detail_url,
                    rating = excluded.rating,
                    review_count = excluded.review_count,
                    price_tier = excluded.price_tier,
                    tags = excluded.tags,
                    images = excluded.images,
                    address = excluded.address,
                    phone = excluded.phone,
                    location = excluded.location,
                    page = excluded.page,
                    scraped_at = excluded.scraped_at",
            )?;

            for listing in listings {
                stmt.execute(params![
                    listing.id,
                    listing.name,
                    listing.detail_url,
                    listing.rating,
                    listing.review_count,
                    listing.price_tier,
                    serde_json::to_string(&listing.tags)?,
                    serde_json::to_string(&listing.images)?,
                    listing.address,
                    listing.phone,
                    location,
                    page,
                    now,
                ])?;
            }
        }

        tx.commit()?;
        Ok(listings.len())
    }

    fn get_listing(&self, id: &str) -> StorageResult<Option<ListingDetail>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, detail_url, rating, review_count, price_tier, tags, images, address, phone
             FROM listings WHERE id = ?1",
        )?;

        let row = stmt
            .query_row(params![id], |row| {
                Ok((
                    ListingDetail {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        detail_url: row.get(2)?,
                        rating: row.get(3)?,
                        review_count: row.get(4)?,
                        price_tier: row.get(5)?,
                        tags: Vec::new(),
                        images: Vec::new(),
                        address: row.get(8)?,
                        phone: row.get(9)?,
                    },
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })
            .optional()?;

        match row {
            Some((mut listing, tags, images)) => {
                listing.tags = serde_json::from_str(&tags)?;
                listing.images = serde_json::from_str(&images)?;
                Ok(Some(listing))
            }
            None => Ok(None),
        }
    }

    fn count_listings(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))?;
        u64::try_from(count).map_err(|e| StorageError::Database(e.to_string()))
    }

    // ===== Locations =====

    fn upsert_location(&mut self, location: &Location) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO locations
                (name, url, food_url, fun_url, lodging_url, place_type, latitude, longitude, resolved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(name) DO UPDATE SET
                url = excluded.url,
                food_url = excluded.food_url,
                fun_url = excluded.fun_url,
                lodging_url = excluded.lodging_url,
                place_type = excluded.place_type,
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                resolved_at = excluded.resolved_at",
            params![
                location.name,
                location.url,
                location.listing_url.food,
                location.listing_url.fun,
                location.listing_url.lodging,
                location.place_type,
                location.latitude,
                location.longitude,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn load_locations(&self) -> StorageResult<Vec<Location>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, url, food_url, fun_url, lodging_url, place_type, latitude, longitude
             FROM locations ORDER BY name",
        )?;

        let locations = stmt
            .query_map([], |row| {
                Ok(Location {
                    name: row.get(0)?,
                    url: row.get(1)?,
                    listing_url: CategoryUrls {
                        food: row.get(2)?,
                        fun: row.get(3)?,
                        lodging: row.get(4)?,
                    },
                    place_type: row.get(5)?,
                    latitude: row.get(6)?,
                    longitude: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(locations)
    }
}
