//! Engagement Flux - Deterministic engagement metrics and composite scoring
//!
//! Flux turns per-entity interaction histories (accounts, creators, content
//! streams) into ranked, classified results through a deterministic pipeline:
//! ingestion → temporal features → metrics → composite score → classification
//! → portfolio aggregation → report encoding.
//!
//! ## Flavors
//!
//! - **Engagement**: eight metrics over one interaction counter (likes by default)
//! - **Content**: a twelve-feature vector over views, likes, comments and shares

pub mod classifier;
pub mod config;
pub mod content;
pub mod error;
pub mod features;
pub mod pipeline;
pub mod portfolio;
pub mod predictor;
pub mod report;
pub mod schema;
pub mod scoring;
pub mod stats;
pub mod temporal;
pub mod types;

pub use classifier::{ClassificationPolicy, CutPoints, LabelSet};
pub use config::AnalysisConfig;
pub use error::ComputeError;
pub use pipeline::{analyze_cohort, CohortAnalysis, EngagementPipeline};
pub use report::{AnalysisReport, ReportEncoder};
pub use scoring::{CompositeScorer, WeightConfig};

// Schema exports
pub use schema::{CohortAdapter, ValidationReport};

/// Flux version embedded in every report
pub const FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "engagement-flux";
