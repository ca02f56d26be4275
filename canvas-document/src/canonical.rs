//! Canonical serialized representation of documents.
//!
//! Canonical output is the basis for hashing, change detection and fixture
//! comparison, so it must depend only on content:
//!
//! - object keys are sorted lexicographically at every depth;
//! - arrays keep their order (child order is z-order);
//! - two-space indentation and a trailing newline.
//!
//! Numbers are written as given. Producers normalize geometry beforehand
//! (see [`crate::geometry::normalize_rect`]).

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{CanvasDocument, DocumentError, DocumentResult};

/// Recursively sort all object keys.
#[must_use]
pub fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (key, child) in entries {
                sorted.insert(key, canonicalize(child));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Serialize any payload in canonical form.
///
/// # Errors
///
/// Returns an error if the payload cannot be represented as JSON.
pub fn serialize_value<T: Serialize + ?Sized>(payload: &T) -> DocumentResult<String> {
    let value = canonicalize(serde_json::to_value(payload)?);
    let mut out = serde_json::to_string_pretty(&value).map_err(DocumentError::Serialization)?;
    out.push('\n');
    Ok(out)
}

/// Serialize a document in canonical form.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize(document: &CanvasDocument) -> DocumentResult<String> {
    serialize_value(document)
}

/// Parse a document, enforcing document invariants.
///
/// # Errors
///
/// Returns an error if `json` is not a valid document.
pub fn parse(json: &str) -> DocumentResult<CanvasDocument> {
    serde_json::from_str(json).map_err(DocumentError::Serialization)
}

/// Whether two documents serialize to the same canonical bytes.
#[must_use]
pub fn would_be_identical(a: &CanvasDocument, b: &CanvasDocument) -> bool {
    match (serialize(a), serialize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Whether two JSON values are canonically equal.
///
/// Key order is ignored and numbers compare by value, so `10` and `10.0`
/// are equal. Used for `test` patches and every field comparison in diff and
/// merge.
#[must_use]
pub fn values_identical(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| values_identical(x, y))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).is_some_and(|w| values_identical(v, w)))
        }
        _ => a == b,
    }
}
