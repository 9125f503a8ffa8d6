//! Detail page enrichment
//!
//! Turns a listing summary plus its detail page into a [`ListingDetail`].
//! Only the identity group (name and address, which the record id is derived
//! from) is mandatory; every other group that fails to extract is reported
//! and left at its sentinel default.

use crate::extract::embedded::extract_embedded_state;
use crate::extract::ExtractionError;
use crate::model::{ListingDetail, ListingSummary};
use serde_json::Value;

/// Embedded-state key holding name, address and phone
pub const IDENTITY_KEY: &str = "businessInfo";

/// Embedded-state key holding the rating and review count
pub const REVIEW_SUMMARY_KEY: &str = "reviewSummary";

/// Embedded-state key holding the price tier and cuisine tags
pub const TAGS_KEY: &str = "establishmentTags";

/// Embedded-state key holding the photo gallery
pub const PHOTOS_KEY: &str = "photos";

/// A field group that could not be extracted and was left at its default
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFailure {
    pub group: &'static str,
    pub error: ExtractionError,
}

/// A populated record plus the field groups that degraded to defaults
#[derive(Debug, Clone)]
pub struct Enrichment {
    pub detail: ListingDetail,
    pub degraded: Vec<FieldFailure>,
}

/// Builds a listing record from a summary and its detail page
///
/// Fails only when the identity group is unusable; the record id is assigned
/// from the final address and name before returning.
pub fn enrich_listing(
    summary: &ListingSummary,
    html: &str,
    marker: &str,
) -> Result<Enrichment, ExtractionError> {
    let mut detail = ListingDetail::from_summary(summary);
    let mut degraded = Vec::new();

    let identity = extract_embedded_state(html, marker, IDENTITY_KEY).into_result(IDENTITY_KEY)?;
    apply_identity(&mut detail, &identity)?;

    let groups: [(&'static str, fn(&mut ListingDetail, &Value) -> Result<(), ExtractionError>); 3] = [
        (REVIEW_SUMMARY_KEY, apply_review_summary),
        (TAGS_KEY, apply_tags),
        (PHOTOS_KEY, apply_photos),
    ];

    for (group, apply) in groups {
        let outcome = extract_embedded_state(html, marker, group)
            .into_result(group)
            .and_then(|value| apply(&mut detail, &value));

        if let Err(error) = outcome {
            degraded.push(FieldFailure { group, error });
        }
    }

    detail.assign_id();
    Ok(Enrichment { detail, degraded })
}

fn apply_identity(detail: &mut ListingDetail, value: &Value) -> Result<(), ExtractionError> {
    let name = required_str(value, "name")?;
    let address = match value.get("address") {
        Some(Value::String(s)) => s.trim().to_string(),
        // Structured addresses carry a preformatted line
        Some(obj @ Value::Object(_)) => required_str(obj, "fullAddress")?,
        Some(_) => return Err(ExtractionError::shape("address", "expected string or object")),
        None => return Err(ExtractionError::Missing("address".to_string())),
    };
    if address.is_empty() {
        return Err(ExtractionError::Missing("address".to_string()));
    }

    detail.name = name;
    detail.address = address;
    detail.phone = value
        .get("phone")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    Ok(())
}

fn apply_review_summary(detail: &mut ListingDetail, value: &Value) -> Result<(), ExtractionError> {
    let rating = value
        .get("rating")
        .ok_or_else(|| ExtractionError::Missing("rating".to_string()))?
        .as_f64()
        .ok_or_else(|| ExtractionError::shape("rating", "expected a number"))?;
    let count = value
        .get("count")
        .ok_or_else(|| ExtractionError::Missing("reviewCount".to_string()))?
        .as_i64()
        .ok_or_else(|| ExtractionError::shape("reviewCount", "expected an integer"))?;

    // Both or neither
    detail.rating = rating;
    detail.review_count = count;
    Ok(())
}

fn apply_tags(detail: &mut ListingDetail, value: &Value) -> Result<(), ExtractionError> {
    let price_tier = value
        .get("priceTier")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    let tags = match value.get("tags") {
        Some(Value::Array(items)) => items.iter().filter_map(named_text).collect(),
        Some(_) => return Err(ExtractionError::shape("tags", "expected an array")),
        None => Vec::new(),
    };

    detail.price_tier = price_tier;
    detail.tags = tags;
    Ok(())
}

fn apply_photos(detail: &mut ListingDetail, value: &Value) -> Result<(), ExtractionError> {
    let Value::Array(items) = value else {
        return Err(ExtractionError::shape("images", "expected an array"));
    };
    let photos: Vec<String> = items
        .iter()
        .filter_map(|item| match item {
            Value::String(url) => Some(url.clone()),
            other => other.get("url").and_then(Value::as_str).map(str::to_string),
        })
        .collect();

    // Gallery supersedes listing-page previews only when it has something
    if !photos.is_empty() {
        detail.images = photos;
    }
    Ok(())
}

fn required_str(value: &Value, field: &str) -> Result<String, ExtractionError> {
    let text = value
        .get(field)
        .ok_or_else(|| ExtractionError::Missing(field.to_string()))?
        .as_str()
        .ok_or_else(|| ExtractionError::shape(field, "expected a string"))?
        .trim();
    if text.is_empty() {
        return Err(ExtractionError::Missing(field.to_string()));
    }
    Ok(text.to_string())
}

/// Tags arrive either as bare strings or as `{ "name": ... }` objects
fn named_text(item: &Value) -> Option<String> {
    match item {
        Value::String(s) => Some(s.clone()),
        other => other.get("name").and_then(Value::as_str).map(str::to_string),
    }
}
