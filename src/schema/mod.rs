//! Cohort input schema
//!
//! Raw entity and event shapes accepted at the ingestion boundary, and the
//! adapter that validates them into [`crate::types::EntityRecord`]s.

mod adapter;
mod raw_entity;

pub use adapter::*;
pub use raw_entity::*;
