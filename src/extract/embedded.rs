//! Embedded JSON state extraction
//!
//! Server-rendered pages inline their client state as a JSON object following
//! a marker token inside a script. The interesting part of that object is a
//! flat dictionary of cached query results whose `data` members are JSON
//! documents encoded as strings. This is the most fragile contact point with
//! the upstream markup, so every failure mode is a distinct variant.

use crate::extract::ExtractionError;
use serde_json::Value;

/// Outcome of looking up one key in a page's embedded state
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddedState {
    /// The first cached sub-document containing the key yielded this value
    Found(Value),
    /// The state parsed but no sub-document contains the key
    NotFound,
    /// The marker is absent or the JSON around it does not parse
    MalformedJson(String),
}

impl EmbeddedState {
    /// Converts the lookup outcome into a result, naming `key` on failure
    pub fn into_result(self, key: &str) -> Result<Value, ExtractionError> {
        match self {
            Self::Found(value) => Ok(value),
            Self::NotFound => Err(ExtractionError::NotFound(key.to_string())),
            Self::MalformedJson(reason) => Err(ExtractionError::MalformedJson(reason)),
        }
    }
}

/// Finds the value stored under `key` in the page's embedded state
///
/// # Example
///
/// ```
/// use dinescout::extract::{extract_embedded_state, EmbeddedState};
///
/// let html = r#"<script>window.__S = {pageManifest:{"urqlCache":{"results":{
///     "7":{"data":"{\"reviewSummary\":{\"rating\":4.5}}"}}}}};</script>"#;
/// let state = extract_embedded_state(html, "pageManifest:", "reviewSummary");
/// assert!(matches!(state, EmbeddedState::Found(_)));
/// ```
pub fn extract_embedded_state(html: &str, marker: &str, key: &str) -> EmbeddedState {
    let manifest = match parse_manifest(html, marker) {
        Ok(manifest) => manifest,
        Err(reason) => return EmbeddedState::MalformedJson(reason),
    };

    let Some(entries) = cache_entries(&manifest).and_then(Value::as_object) else {
        return EmbeddedState::MalformedJson("state has no result dictionary".to_string());
    };

    let needle = format!("\"{}\"", key);
    let mut corrupt = None;

    // Entries are visited in page order
    for (entry_id, entry) in entries {
        let Some(data) = entry.get("data") else {
            continue;
        };

        let document = match data {
            Value::String(encoded) => {
                // Cheap pre-filter before decoding every cached document
                if !encoded.contains(&needle) {
                    continue;
                }
                match serde_json::from_str::<Value>(encoded) {
                    Ok(document) => document,
                    Err(e) => {
                        corrupt.get_or_insert_with(|| {
                            format!("entry {} is not valid JSON: {}", entry_id, e)
                        });
                        continue;
                    }
                }
            }
            other => other.clone(),
        };

        if let Some(value) = find_key(&document, key) {
            return EmbeddedState::Found(value.clone());
        }
    }

    match corrupt {
        Some(reason) => EmbeddedState::MalformedJson(reason),
        None => EmbeddedState::NotFound,
    }
}

/// Depth-first search for the first object member named `key`
pub fn find_key<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map
            .get(key)
            .or_else(|| map.values().find_map(|child| find_key(child, key))),
        Value::Array(items) => items.iter().find_map(|child| find_key(child, key)),
        _ => None,
    }
}

/// Deserializes exactly one JSON object following the marker, ignoring the rest of the script
fn parse_manifest(html: &str, marker: &str) -> Result<Value, String> {
    let start = html
        .find(marker)
        .ok_or_else(|| format!("marker `{}` not present", marker))?;
    let rest = html[start + marker.len()..].trim_start();

    if !rest.starts_with('{') {
        return Err(format!("marker `{}` is not followed by an object", marker));
    }

    serde_json::Deserializer::from_str(rest)
        .into_iter::<Value>()
        .next()
        .ok_or_else(|| "state is empty".to_string())?
        .map_err(|e| format!("state does not parse: {}", e))
}

/// The result dictionary lives under `urqlCache.results` on current pages and
/// directly under `urqlCache` on older ones
fn cache_entries(manifest: &Value) -> Option<&Value> {
    let cache = manifest.get("urqlCache")?;
    Some(cache.get("results").unwrap_or(cache))
}
