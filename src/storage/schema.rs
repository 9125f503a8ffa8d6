//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Dinescout mirror.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per listing, keyed by the id derived from address and name
CREATE TABLE IF NOT EXISTS listings (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    detail_url TEXT NOT NULL,
    rating REAL NOT NULL DEFAULT -1.0,
    review_count INTEGER NOT NULL DEFAULT -1,
    price_tier TEXT NOT NULL DEFAULT '',
    tags TEXT NOT NULL DEFAULT '[]',
    images TEXT NOT NULL DEFAULT '[]',
    address TEXT NOT NULL,
    phone TEXT NOT NULL DEFAULT '',
    location TEXT NOT NULL,
    page INTEGER NOT NULL,
    scraped_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_listings_location ON listings(location);

-- Resolved search scopes
CREATE TABLE IF NOT EXISTS locations (
    name TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    food_url TEXT NOT NULL,
    fun_url TEXT NOT NULL,
    lodging_url TEXT NOT NULL,
    place_type TEXT NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    resolved_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
///
/// Safe to call on an existing database; every statement is `IF NOT EXISTS`.
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
