//! Adapter from raw cohort JSON to validated entity records
//!
//! Parsing is structural: broken JSON syntax fails the whole input. Everything
//! else is per entity: a mistyped entry or the first bad event rejects its
//! entity and leaves the rest of the cohort untouched.

use crate::error::ComputeError;
use crate::schema::raw_entity::{FieldValue, RawEntity, RawEvent};
use crate::temporal::parse_timestamp;
use crate::types::{Counter, EntityRecord, InteractionEvent};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Adapter for converting raw cohort payloads to entity records
pub struct CohortAdapter;

/// An entity that failed validation
#[derive(Debug)]
pub struct RejectedEntity {
    pub id: String,
    pub error: ComputeError,
}

impl CohortAdapter {
    /// Parse any accepted shape
    ///
    /// A JSON array is a list of entities and a JSON object is keyed by
    /// entity id. Input that is not a single JSON document is read as NDJSON.
    pub fn parse(input: &str) -> Result<Vec<RawEntity>, ComputeError> {
        let trimmed = input.trim_start();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<serde_json::Value>(input) {
            Ok(serde_json::Value::Array(_)) => Self::parse_array(input),
            // A lone entity object (single-line NDJSON)
            Ok(serde_json::Value::Object(map)) if names_an_entity(&map) => {
                Ok(vec![RawEntity::from_value(serde_json::Value::Object(map))])
            }
            Ok(serde_json::Value::Object(_)) => Self::parse_keyed(input),
            Ok(other) => Err(ComputeError::ParseError(format!(
                "expected an array or object of entities, got {}",
                json_kind(&other)
            ))),
            // More than one document: try line-delimited
            Err(e) if e.is_syntax() && trimmed.starts_with('{') => Self::parse_ndjson(input),
            Err(e) => Err(ComputeError::JsonError(e)),
        }
    }

    /// Parse a JSON array of entity objects
    pub fn parse_array(json: &str) -> Result<Vec<RawEntity>, ComputeError> {
        let entries: Vec<serde_json::Value> = serde_json::from_str(json)?;
        Ok(entries.into_iter().map(RawEntity::from_value).collect())
    }

    /// Parse a JSON object keyed by entity id
    ///
    /// Entries keep input order. A value is either an entity object or a bare
    /// event list; an `id` inside an entry is overridden by its key.
    pub fn parse_keyed(json: &str) -> Result<Vec<RawEntity>, ComputeError> {
        let keyed: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;
        Ok(keyed
            .into_iter()
            .map(|(id, value)| {
                let value = match value {
                    serde_json::Value::Array(events) => {
                        let mut entity = serde_json::Map::new();
                        entity.insert("events".to_string(), serde_json::Value::Array(events));
                        serde_json::Value::Object(entity)
                    }
                    other => other,
                };
                RawEntity {
                    id: Some(id),
                    ..RawEntity::from_value(value)
                }
            })
            .collect())
    }

    /// Parse NDJSON (newline-delimited JSON), one entity per line
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<RawEntity>, ComputeError> {
        let mut entities = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<serde_json::Value>(trimmed) {
                Ok(value) => entities.push(RawEntity::from_value(value)),
                Err(e) => {
                    return Err(ComputeError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(entities)
    }

    /// Validate every entity, preserving input order
    ///
    /// A repeated id rejects the later entity. The first occurrence claims the
    /// id whether or not it is itself valid.
    pub fn to_records(entities: &[RawEntity]) -> Vec<Result<EntityRecord, RejectedEntity>> {
        let mut seen: HashSet<&str> = HashSet::new();
        entities
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                let id = display_id(raw, index);
                if let Some(claimed) = claimed_id(raw) {
                    if !seen.insert(claimed) {
                        return Err(RejectedEntity {
                            id,
                            error: ComputeError::MalformedInput(format!(
                                "duplicate entity id '{claimed}'"
                            )),
                        });
                    }
                }
                validate_entity(raw).map_err(|error| RejectedEntity { id, error })
            })
            .collect()
    }

    /// Parse and validate in one step
    pub fn ingest(input: &str) -> Result<Vec<Result<EntityRecord, RejectedEntity>>, ComputeError> {
        let raw = Self::parse(input)?;
        Ok(Self::to_records(&raw))
    }

    /// Validate a cohort without analyzing it
    pub fn validate_cohort(entities: &[RawEntity]) -> ValidationReport {
        let results = Self::to_records(entities);
        let issues: Vec<ValidationIssue> = results
            .iter()
            .enumerate()
            .filter_map(|(index, result)| match result {
                Ok(_) => None,
                Err(rejected) => Some(ValidationIssue {
                    index,
                    id: rejected.id.clone(),
                    code: rejected.error.code().to_string(),
                    message: rejected.error.to_string(),
                }),
            })
            .collect();
        let events = entities.iter().map(|e| e.events.len()).sum();

        ValidationReport {
            entities: entities.len(),
            events,
            valid: entities.len() - issues.len(),
            issues,
        }
    }
}

/// Outcome of validating a cohort
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub entities: usize,
    pub events: usize,
    pub valid: usize,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// One rejected entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub index: usize,
    pub id: String,
    pub code: String,
    pub message: String,
}

/// Id used in error reports; entities without one are named by position
fn display_id(raw: &RawEntity, index: usize) -> String {
    match raw.id.as_deref() {
        Some(id) if !id.trim().is_empty() => id.to_string(),
        _ => format!("#{index}"),
    }
}

/// Trimmed, non-empty id an entity stakes a claim on
fn claimed_id(raw: &RawEntity) -> Option<&str> {
    raw.id.as_deref().map(str::trim).filter(|id| !id.is_empty())
}

fn validate_entity(raw: &RawEntity) -> Result<EntityRecord, ComputeError> {
    if let Some(reason) = &raw.malformed {
        return Err(ComputeError::MalformedInput(reason.clone()));
    }
    let id = match claimed_id(raw) {
        Some(id) => id.to_string(),
        None => return Err(ComputeError::MissingField("entity id".to_string())),
    };

    let events = raw
        .events
        .iter()
        .enumerate()
        .map(|(index, event)| validate_event(event, index))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(EntityRecord { id, events })
}

fn validate_event(raw: &RawEvent, index: usize) -> Result<InteractionEvent, ComputeError> {
    let timestamp = match &raw.timestamp {
        None => {
            return Err(ComputeError::MissingField(format!(
                "events[{index}].timestamp"
            )))
        }
        Some(value) => {
            let text = value.as_text().ok_or_else(|| {
                ComputeError::TimestampParse(format!(
                    "events[{index}]: expected a string, got {}",
                    value.describe()
                ))
            })?;
            parse_timestamp(text).map_err(|e| match e {
                ComputeError::TimestampParse(msg) => {
                    ComputeError::TimestampParse(format!("events[{index}]: {msg}"))
                }
                other => other,
            })?
        }
    };

    let mut interaction_counts = BTreeMap::new();
    for (name, value) in &raw.fields {
        let known = Counter::KNOWN.iter().any(|c| c.as_str() == name);
        match value.as_count() {
            Some(count) => {
                interaction_counts.insert(name.clone(), count);
            }
            None if known => {
                return Err(ComputeError::MalformedInput(format!(
                    "events[{index}].{name} must be a non-negative integer, got {}",
                    value.describe()
                )));
            }
            // Metadata (captions, hashtags, flags, ...)
            None => {}
        }
    }

    Ok(InteractionEvent {
        timestamp,
        interaction_counts,
        title: raw
            .title
            .as_ref()
            .and_then(FieldValue::as_text)
            .map(str::to_string),
    })
}

/// Whether a top-level object is itself an entity rather than a map of them
fn names_an_entity(map: &serde_json::Map<String, serde_json::Value>) -> bool {
    let id_keys = ["id", "username", "creator"];
    let has_string_id = id_keys
        .iter()
        .any(|key| matches!(map.get(*key), Some(serde_json::Value::String(_))));
    let has_id = id_keys.iter().any(|key| map.contains_key(*key));
    let has_events = ["events", "posts", "videos"]
        .iter()
        .any(|key| map.contains_key(*key));
    has_string_id || (has_id && has_events)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
