//! Raw cohort input schema
//!
//! Loosely-typed shapes accepted at the ingestion boundary. Entities may name
//! their id `id`, `username` or `creator`, and their events `events`, `posts`
//! or `videos`. Every event field other than `timestamp` and `title` is kept as
//! a [`FieldValue`] and checked during validation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One entity as it appears in the input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntity {
    /// Entity identifier; absent for the keyed-object shape until the key is applied
    #[serde(default, alias = "username", alias = "creator")]
    pub id: Option<String>,
    #[serde(default, alias = "posts", alias = "videos")]
    pub events: Vec<RawEvent>,
    /// Why this entry could not be read as an entity, if it could not
    #[serde(skip)]
    pub malformed: Option<String>,
}

impl RawEntity {
    /// Read one cohort entry
    ///
    /// A type mismatch (`"posts": null`, `"id": 42`, an event that is not an
    /// object) is kept as a malformed entity so that only this entry fails.
    /// A string id is still recovered when present.
    pub fn from_value(value: serde_json::Value) -> Self {
        let id = ["id", "username", "creator"]
            .iter()
            .find_map(|key| value.get(*key).and_then(serde_json::Value::as_str))
            .map(str::to_string);

        serde_json::from_value(value).unwrap_or_else(|e| RawEntity {
            id,
            events: Vec::new(),
            malformed: Some(e.to_string()),
        })
    }
}

/// One event as it appears in the input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<FieldValue>,
    /// Counters and free-form metadata
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

/// Flexible field value (variant order decides how JSON numbers land)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Non-negative integer
    Count(u64),
    /// Any other number (negative or fractional)
    Number(f64),
    Text(String),
    Flag(bool),
    /// Null, arrays and nested objects
    Other(serde_json::Value),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Value as a counter, if it is a non-negative whole number
    ///
    /// Whole-valued floats (`12.0`) are accepted.
    pub fn as_count(&self) -> Option<u64> {
        match self {
            FieldValue::Count(n) => Some(*n),
            FieldValue::Number(x)
                if x.is_finite() && *x >= 0.0 && x.fract() == 0.0 && *x <= u64::MAX as f64 =>
            {
                Some(*x as u64)
            }
            _ => None,
        }
    }

    /// Short description for error messages
    pub fn describe(&self) -> String {
        match self {
            FieldValue::Count(n) => n.to_string(),
            FieldValue::Number(x) => x.to_string(),
            FieldValue::Text(s) => format!("\"{s}\""),
            FieldValue::Flag(b) => b.to_string(),
            FieldValue::Other(v) => v.to_string(),
        }
    }
}
