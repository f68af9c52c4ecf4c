//! Report encoding
//!
//! This module wraps one run's outcomes in an `AnalysisReport` with producer
//! metadata, and renders a short plain-text summary for terminals.

use crate::classifier::ClassificationPolicy;
use crate::config::AnalysisConfig;
use crate::error::ComputeError;
use crate::pipeline::CohortAnalysis;
use crate::types::{EntityOutcome, Flavor, PortfolioSummary};
use crate::{FLUX_VERSION, PRODUCER_NAME};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use uuid::Uuid;

/// Current report format version
pub const REPORT_VERSION: &str = "1.0.0";

/// Who produced a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    /// Unique per run
    pub run_id: String,
}

/// Identity of the weight configuration used
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightsRef {
    pub name: String,
    pub version: u32,
}

/// Complete output of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub report_version: String,
    pub producer: ReportProducer,
    /// RFC 3339
    pub computed_at_utc: String,
    pub flavor: Flavor,
    pub weights: WeightsRef,
    pub policy: ClassificationPolicy,
    pub entities: Vec<EntityOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portfolio: Option<PortfolioSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portfolio_error: Option<String>,
}

/// Report encoder stamping every report with one run id
pub struct ReportEncoder {
    run_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a fresh run ID
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific run ID
    pub fn with_run_id(run_id: String) -> Self {
        Self { run_id }
    }

    /// Wrap an analysis in a report
    pub fn encode(&self, analysis: &CohortAnalysis, config: &AnalysisConfig) -> AnalysisReport {
        let (portfolio, portfolio_error) = match &analysis.portfolio {
            Ok(summary) => (Some(summary.clone()), None),
            Err(e) => (None, Some(e.to_string())),
        };

        AnalysisReport {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: FLUX_VERSION.to_string(),
                run_id: self.run_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            flavor: config.flavor.clone(),
            weights: WeightsRef {
                name: config.weights.name.clone(),
                version: config.weights.version,
            },
            policy: config.policy,
            entities: analysis.outcomes.clone(),
            portfolio,
            portfolio_error,
        }
    }

    /// Encode to JSON string
    pub fn encode_to_json(
        &self,
        analysis: &CohortAnalysis,
        config: &AnalysisConfig,
    ) -> Result<String, ComputeError> {
        let report = self.encode(analysis, config);
        serde_json::to_string_pretty(&report).map_err(ComputeError::JsonError)
    }
}

/// Plain-text summary of a report: ranking, portfolio risk and distribution
pub fn render_summary(report: &AnalysisReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {} | {} flavor | weights {} v{} | {} policy",
        report.producer.name,
        report.producer.version,
        report.flavor.as_str(),
        report.weights.name,
        report.weights.version,
        report.policy.as_str()
    );

    let mut scored: Vec<_> = report.entities.iter().filter_map(EntityOutcome::as_scored).collect();
    scored.sort_by(|a, b| {
        b.composite_score
            .total_cmp(&a.composite_score)
            .then_with(|| a.id.cmp(&b.id))
    });

    let _ = writeln!(out, "\nRanking:");
    for (rank, result) in scored.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>3}. {:<24} {:>10.4}  {}",
            rank + 1,
            result.id,
            result.composite_score,
            result.label
        );
    }

    let failed: Vec<_> = report
        .entities
        .iter()
        .filter_map(|o| match o {
            EntityOutcome::Failed { id, error } => Some((id, error)),
            EntityOutcome::Scored(_) => None,
        })
        .collect();
    if !failed.is_empty() {
        let _ = writeln!(out, "\nFailed:");
        for (id, error) in failed {
            let _ = writeln!(out, "  {id}: {error}");
        }
    }

    match (&report.portfolio, &report.portfolio_error) {
        (Some(portfolio), _) => {
            let risk = &portfolio.risk;
            let score = risk
                .score
                .map(|s| format!("{s:.3}"))
                .unwrap_or_else(|| "n/a".to_string());
            let _ = writeln!(out, "\nPortfolio risk: {} (score {score})", risk.level.label());

            let recs = &portfolio.recommendations;
            for (title, ids) in [
                ("Top performers", &recs.top_performers),
                ("Emerging", &recs.emerging),
                ("Value picks", &recs.value_picks),
                ("Avoid", &recs.avoid),
            ] {
                let listed = if ids.is_empty() {
                    "-".to_string()
                } else {
                    ids.join(", ")
                };
                let _ = writeln!(out, "{title}: {listed}");
            }

            let _ = writeln!(out, "\nSentiment distribution:");
            for share in &portfolio.distribution {
                let _ = writeln!(
                    out,
                    "  {:<16} {:>3} ({:.1}%)",
                    share.label, share.count, share.percentage
                );
            }
        }
        (None, Some(error)) => {
            let _ = writeln!(out, "\nNo portfolio: {error}");
        }
        (None, None) => {}
    }

    out
}
