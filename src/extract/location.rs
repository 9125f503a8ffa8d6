//! Location search request and response handling
//!
//! The site's typeahead endpoint answers a batched GraphQL request. Only the
//! first result carrying a `details` block is used.

use crate::extract::ExtractionError;
use crate::model::{CategoryUrls, Location};
use serde::Deserialize;
use serde_json::{json, Value};

const RESULT_LIMIT: u32 = 10;

const RESULT_TYPES: &[&str] = &["LOCATION", "QUERY_SUGGESTION", "RESCUE_RESULT"];

const LOCATION_TYPES: &[&str] = &[
    "GEO",
    "AIRPORT",
    "ACCOMMODATION",
    "ATTRACTION",
    "ATTRACTION_PRODUCT",
    "EATERY",
    "NEIGHBORHOOD",
    "AIRLINE",
    "SHOPPING",
    "UNIVERSITY",
    "GENERAL_HOSPITAL",
    "PORT",
    "FERRY",
    "CORPORATION",
    "VACATION_RENTAL",
    "SHIP",
    "CRUISE_LINE",
    "CAR_RENTAL_OFFICE",
];

#[derive(Debug, Deserialize)]
struct Batch {
    data: BatchData,
}

#[derive(Debug, Deserialize)]
struct BatchData {
    #[serde(rename = "Typeahead_autocomplete")]
    typeahead: Typeahead,
}

#[derive(Debug, Deserialize)]
struct Typeahead {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    details: Option<LocationDetails>,
}

#[derive(Debug, Deserialize)]
struct LocationDetails {
    #[serde(rename = "localizedName")]
    name: String,
    url: String,
    #[serde(rename = "RESTAURANTS_URL")]
    restaurants_url: String,
    #[serde(rename = "ATTRACTIONS_URL")]
    attractions_url: String,
    #[serde(rename = "HOTELS_URL")]
    hotels_url: String,
    #[serde(rename = "placeType")]
    place_type: String,
    latitude: f64,
    longitude: f64,
}

impl From<LocationDetails> for Location {
    fn from(details: LocationDetails) -> Self {
        Location {
            name: details.name,
            url: details.url,
            listing_url: CategoryUrls {
                food: details.restaurants_url,
                fun: details.attractions_url,
                lodging: details.hotels_url,
            },
            place_type: details.place_type,
            latitude: details.latitude,
            longitude: details.longitude,
        }
    }
}

/// Builds the typeahead request body for a free-text location query
pub fn search_request(query_id: &str, query: &str) -> Value {
    json!([{
        "query": query_id,
        "variables": {
            "request": {
                "query": query,
                "limit": RESULT_LIMIT,
                "scope": "WORLDWIDE",
                "locale": "en-US",
                "scopeGeoId": 1,
                "searchCenter": null,
                "types": RESULT_TYPES,
                "locationTypes": LOCATION_TYPES,
                "userId": null,
                "articleCategories": ["default", "love_your_local", "insurance_lander"],
                "enabledFeatures": ["typeahead-q", "articles"],
            }
        }
    }])
}

/// Parses a typeahead response into the first fully described location
pub fn parse_location_response(body: &str) -> Result<Location, ExtractionError> {
    let batches: Vec<Batch> = serde_json::from_str(body)
        .map_err(|e| ExtractionError::shape("Typeahead_autocomplete", e.to_string()))?;

    let batch = batches
        .into_iter()
        .next()
        .ok_or_else(|| ExtractionError::Missing("Typeahead_autocomplete".to_string()))?;

    batch
        .data
        .typeahead
        .results
        .into_iter()
        .find_map(|result| result.details)
        .map(Location::from)
        .ok_or_else(|| ExtractionError::Missing("details".to_string()))
}
