//! Pipeline orchestration
//!
//! This module provides the public API for Engagement Flux.
//! It orchestrates the full pipeline from raw cohort JSON to the analysis report.

use crate::config::AnalysisConfig;
use crate::content::ContentAnalyzer;
use crate::error::ComputeError;
use crate::features::MetricEngine;
use crate::portfolio::PortfolioAggregator;
use crate::report::ReportEncoder;
use crate::schema::{CohortAdapter, RejectedEntity};
use crate::scoring::CompositeScorer;
use crate::types::{
    CompositeResult, EntityMetrics, EntityOutcome, EntityRecord, Flavor, PortfolioSummary,
};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::HashSet;

/// Analyze a raw cohort payload and return the JSON report.
///
/// # Arguments
/// * `raw_json` - Cohort JSON (array of entities, object keyed by id, or NDJSON)
/// * `config` - Analysis configuration (flavor, weights, policy, ...)
///
/// # Returns
/// Pretty-printed `AnalysisReport` JSON
///
/// # Example
/// ```ignore
/// let report = analyze_cohort(&cohort_json, AnalysisConfig::content_default())?;
/// ```
pub fn analyze_cohort(raw_json: &str, config: AnalysisConfig) -> Result<String, ComputeError> {
    let pipeline = EngagementPipeline::new(config)?;
    let analysis = pipeline.analyze_json(raw_json)?;
    ReportEncoder::new().encode_to_json(&analysis, pipeline.config())
}

/// Outcome of one run: per-entity outcomes in input order plus the portfolio
#[derive(Debug)]
pub struct CohortAnalysis {
    pub outcomes: Vec<EntityOutcome>,
    /// `CohortEmpty` when no entity could be scored
    pub portfolio: Result<PortfolioSummary, ComputeError>,
}

impl CohortAnalysis {
    pub fn scored(&self) -> impl Iterator<Item = &CompositeResult> {
        self.outcomes.iter().filter_map(EntityOutcome::as_scored)
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.scored().count()
    }
}

/// Per-entity state after the parallel stages, before classification
enum Staged {
    Scored {
        id: String,
        metrics: EntityMetrics,
        score: f64,
    },
    Failed {
        id: String,
        error: String,
    },
}

/// Configured pipeline: scorer and aggregator are built once and reused per run.
///
/// Holds no state between runs.
#[derive(Debug, Clone)]
pub struct EngagementPipeline {
    config: AnalysisConfig,
    scorer: CompositeScorer,
    aggregator: PortfolioAggregator,
}

impl EngagementPipeline {
    /// Validate the configuration and build the stages
    pub fn new(config: AnalysisConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        let scorer = CompositeScorer::new(config.weights.clone(), &config.flavor)?;
        let aggregator = PortfolioAggregator::new(config.risk, config.limits, config.labels)?;
        Ok(Self {
            config,
            scorer,
            aggregator,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Parse, validate and analyze a raw cohort payload
    ///
    /// Structural parse errors fail the call; invalid entities become
    /// `Failed` outcomes.
    pub fn analyze_json(&self, raw_json: &str) -> Result<CohortAnalysis, ComputeError> {
        let ingested = CohortAdapter::ingest(raw_json)?;
        Ok(self.analyze(ingested))
    }

    /// Analyze already-built records
    ///
    /// A repeated id fails the later record, as at ingestion.
    pub fn analyze_records(&self, records: &[EntityRecord]) -> CohortAnalysis {
        let mut seen = HashSet::new();
        let checked = records
            .iter()
            .map(|record| {
                if seen.insert(record.id.as_str()) {
                    Ok(record.clone())
                } else {
                    Err(RejectedEntity {
                        id: record.id.clone(),
                        error: ComputeError::MalformedInput(format!(
                            "duplicate entity id '{}'",
                            record.id
                        )),
                    })
                }
            })
            .collect();
        self.analyze(checked)
    }

    /// Run every stage over validated (or rejected) entities
    ///
    /// Pipeline stages:
    /// 1. Temporal features + metrics + composite score, in parallel per entity
    /// 2. Classification over the full cohort of scores
    /// 3. Portfolio aggregation
    pub fn analyze(&self, entities: Vec<Result<EntityRecord, RejectedEntity>>) -> CohortAnalysis {
        // Stage 1: per-entity work, input order preserved
        let staged: Vec<Staged> = entities
            .into_par_iter()
            .map(|entity| match entity {
                Ok(record) => {
                    let metrics = self.derive_metrics(&record);
                    let score = self.scorer.score(&metrics);
                    debug!(
                        "entity {}: {} events, composite {:.6}",
                        record.id,
                        record.events.len(),
                        score
                    );
                    Staged::Scored {
                        id: record.id,
                        metrics,
                        score,
                    }
                }
                Err(rejected) => {
                    warn!("entity {} rejected: {}", rejected.id, rejected.error);
                    Staged::Failed {
                        id: rejected.id,
                        error: rejected.error.to_string(),
                    }
                }
            })
            .collect();

        // Stage 2: classification needs the complete, immutable score list
        let scores: Vec<f64> = staged
            .iter()
            .filter_map(|s| match s {
                Staged::Scored { score, .. } => Some(*score),
                Staged::Failed { .. } => None,
            })
            .collect();
        let classified = if scores.is_empty() {
            Ok(Vec::new())
        } else {
            self.config.policy.classify_cohort(&scores)
        };
        let (sentiments, classification_error) = match classified {
            Ok(sentiments) => (sentiments, None),
            Err(e) => {
                warn!("classification failed: {e}");
                (Vec::new(), Some(e.to_string()))
            }
        };

        let mut sentiments = sentiments.into_iter();
        let outcomes: Vec<EntityOutcome> = staged
            .into_iter()
            .map(|s| match s {
                Staged::Scored { id, metrics, score } => match sentiments.next() {
                    Some(sentiment) => EntityOutcome::Scored(CompositeResult {
                        label: self.config.labels.label(sentiment).to_string(),
                        id,
                        metrics,
                        composite_score: score,
                        sentiment,
                    }),
                    None => EntityOutcome::Failed {
                        id,
                        error: classification_error
                            .clone()
                            .unwrap_or_else(|| "entity was not classified".to_string()),
                    },
                },
                Staged::Failed { id, error } => EntityOutcome::Failed { id, error },
            })
            .collect();

        // Stage 3: portfolio
        let portfolio = self.aggregator.aggregate(&outcomes);
        match &portfolio {
            Ok(summary) => info!(
                "analyzed {} entities ({} excluded), risk {}",
                outcomes.len(),
                summary.excluded.len(),
                summary.risk.level.label()
            ),
            Err(e) => warn!("no portfolio for this run: {e}"),
        }

        CohortAnalysis {
            outcomes,
            portfolio,
        }
    }

    fn derive_metrics(&self, record: &EntityRecord) -> EntityMetrics {
        match &self.config.flavor {
            Flavor::Engagement { counter } => {
                EntityMetrics::Engagement(MetricEngine::derive(record, counter))
            }
            Flavor::Content => EntityMetrics::Content(ContentAnalyzer::derive(record)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Counter, Sentiment};
    use pretty_assertions::assert_eq;

    fn instagram_json() -> String {
        // Three accounts with distinct trajectories, plus one broken account
        let account = |name: &str, likes: &[u64]| {
            let posts: Vec<String> = likes
                .iter()
                .enumerate()
                .map(|(i, l)| {
                    format!(
                        r#"{{"timestamp": "2024-03-{:02}T{:02}:00:00Z", "likes": {l}, "comments": {}}}"#,
                        i + 1,
                        8 + i,
                        l / 10
                    )
                })
                .collect();
            format!(r#"{{"username": "{name}", "posts": [{}]}}"#, posts.join(","))
        };
        format!(
            "[{}, {}, {}, {}]",
            account("rising_star", &[10, 20, 15, 30, 25, 40, 45, 60]),
            account("steady_hand", &[100, 102, 98, 101, 99, 100, 103, 100]),
            account("fading_out", &[90, 70, 60, 40, 30, 20, 15, 10]),
            r#"{"username": "broken", "posts": [{"likes": 5}]}"#
        )
    }

    fn video(day: u32, views: u64, likes: u64, comments: u64, shares: u64) -> String {
        format!(
            r#"{{"timestamp": "2024-02-{day:02}", "views": {views}, "likes": {likes}, "comments": {comments}, "shares": {shares}, "title": "Video {day}"}}"#
        )
    }

    #[test]
    fn test_engagement_run() {
        let pipeline = EngagementPipeline::new(AnalysisConfig::engagement_default()).unwrap();
        let analysis = pipeline.analyze_json(&instagram_json()).unwrap();

        let ids: Vec<&str> = analysis.outcomes.iter().map(EntityOutcome::id).collect();
        assert_eq!(ids, vec!["rising_star", "steady_hand", "fading_out", "broken"]);
        assert_eq!(analysis.failed_count(), 1);

        let rising = analysis.outcomes[0].as_scored().unwrap();
        let fading = analysis.outcomes[2].as_scored().unwrap();
        assert!(rising.composite_score > fading.composite_score);
        assert!(matches!(rising.metrics, EntityMetrics::Engagement(_)));

        let portfolio = analysis.portfolio.as_ref().unwrap();
        assert_eq!(portfolio.excluded, vec!["broken"]);
        assert_eq!(portfolio.recommendations.top_performers.len(), 3);
        assert_eq!(portfolio.recommendations.top_performers[0], "rising_star");
    }

    #[test]
    fn test_labels_follow_sentiment() {
        let pipeline = EngagementPipeline::new(AnalysisConfig::engagement_default()).unwrap();
        let analysis = pipeline.analyze_json(&instagram_json()).unwrap();
        for result in analysis.scored() {
            assert_eq!(result.label, pipeline.config().labels.label(result.sentiment));
        }
    }

    #[test]
    fn test_content_run_uses_percentile_ranks() {
        let json = format!(
            r#"{{
                "Creator_0": {{"videos": [{}, {}, {}]}},
                "Creator_1": {{"videos": [{}, {}, {}]}},
                "Creator_2": {{"videos": [{}, {}]}}
            }}"#,
            video(1, 1000, 50, 5, 5),
            video(2, 4000, 220, 30, 25),
            video(3, 9000, 500, 60, 70),
            video(1, 8000, 80, 2, 1),
            video(2, 5000, 40, 1, 0),
            video(3, 2000, 10, 0, 0),
            video(1, 3000, 90, 9, 6),
            video(2, 3000, 95, 10, 6)
        );
        let pipeline = EngagementPipeline::new(AnalysisConfig::content_default()).unwrap();
        let analysis = pipeline.analyze_json(&json).unwrap();
        assert_eq!(analysis.failed_count(), 0);

        // Lowest score sits at percentile 0; with three entities the best is at 66.7
        let best = analysis
            .scored()
            .max_by(|a, b| a.composite_score.total_cmp(&b.composite_score))
            .unwrap();
        let worst = analysis
            .scored()
            .min_by(|a, b| a.composite_score.total_cmp(&b.composite_score))
            .unwrap();
        assert_eq!(best.sentiment, Sentiment::Neutral);
        assert_eq!(best.label, "Neutral");
        assert_eq!(worst.sentiment, Sentiment::ExtremeNegative);
        assert_eq!(worst.label, "Extreme Fear");
        assert_eq!(best.id, "Creator_0");
    }

    #[test]
    fn test_all_failed_reports_cohort_empty() {
        let pipeline = EngagementPipeline::new(AnalysisConfig::content_default()).unwrap();
        let analysis = pipeline
            .analyze_json(r#"[{"id": "a", "events": [{"views": 1}]}]"#)
            .unwrap();
        assert_eq!(analysis.outcomes.len(), 1);
        assert!(matches!(
            analysis.outcomes[0],
            EntityOutcome::Failed { ref id, .. } if id == "a"
        ));
        assert!(matches!(analysis.portfolio, Err(ComputeError::CohortEmpty(_))));
    }

    #[test]
    fn test_invalid_first_twin_keeps_both_out_of_the_portfolio() {
        let pipeline = EngagementPipeline::new(AnalysisConfig::engagement_default()).unwrap();
        let analysis = pipeline
            .analyze_json(
                r#"[
                    {"id": "twin", "events": [{"likes": 3}]},
                    {"id": "twin", "events": [{"timestamp": "2024-01-01", "likes": 1}]},
                    {"id": "solo", "events": [{"timestamp": "2024-01-01", "likes": 2}]}
                ]"#,
            )
            .unwrap();

        assert_eq!(analysis.failed_count(), 2);
        assert!(analysis.scored().all(|r| r.id == "solo"));
        let portfolio = analysis.portfolio.as_ref().unwrap();
        assert_eq!(portfolio.excluded, vec!["twin", "twin"]);
        assert_eq!(portfolio.recommendations.top_performers, vec!["solo"]);
    }

    #[test]
    fn test_mistyped_entity_does_not_abort_the_run() {
        let pipeline = EngagementPipeline::new(AnalysisConfig::engagement_default()).unwrap();
        let analysis = pipeline
            .analyze_json(
                r#"[
                    {"id": "good", "events": [{"timestamp": "2024-01-01", "likes": 5}]},
                    {"id": "nulls", "posts": null},
                    {"id": 42, "events": []},
                    {"id": "holes", "events": [null]}
                ]"#,
            )
            .unwrap();

        let ids: Vec<&str> = analysis.outcomes.iter().map(EntityOutcome::id).collect();
        assert_eq!(ids, vec!["good", "nulls", "#2", "holes"]);
        assert_eq!(analysis.failed_count(), 3);
        assert_eq!(
            analysis.portfolio.as_ref().unwrap().excluded,
            vec!["nulls", "#2", "holes"]
        );
    }

    #[test]
    fn test_duplicate_records_fail_the_later_one() {
        let record = EntityRecord {
            id: "same".to_string(),
            events: vec![],
        };
        let pipeline = EngagementPipeline::new(AnalysisConfig::default()).unwrap();
        let analysis = pipeline.analyze_records(&[record.clone(), record]);
        assert!(analysis.outcomes[0].as_scored().is_some());
        assert!(analysis.outcomes[1].as_scored().is_none());
    }

    #[test]
    fn test_counter_selection() {
        let json = r#"[{"id": "a", "events": [
            {"timestamp": "2024-01-01", "likes": 10, "views": 500},
            {"timestamp": "2024-01-02", "likes": 10, "views": 900}
        ]}]"#;
        let likes = EngagementPipeline::new(AnalysisConfig::engagement_default()).unwrap();
        let views = EngagementPipeline::new(
            AnalysisConfig::engagement_default()
                .with_counter(Counter::Views)
                .unwrap(),
        )
        .unwrap();

        let on_likes = likes.analyze_json(json).unwrap();
        let on_views = views.analyze_json(json).unwrap();
        let velocity = |a: &CohortAnalysis| match &a.outcomes[0].as_scored().unwrap().metrics {
            EntityMetrics::Engagement(m) => m.engagement_velocity,
            EntityMetrics::Content(_) => unreachable!(),
        };
        assert_eq!(velocity(&on_likes), 0.0);
        assert_eq!(velocity(&on_views), 400.0);
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let pipeline = EngagementPipeline::new(AnalysisConfig::engagement_default()).unwrap();
        let a = pipeline.analyze_json(&instagram_json()).unwrap();
        let b = pipeline.analyze_json(&instagram_json()).unwrap();
        assert_eq!(a.outcomes, b.outcomes);
        assert_eq!(a.portfolio.unwrap(), b.portfolio.unwrap());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = AnalysisConfig::engagement_default();
        config.weights.terms.clear();
        assert!(matches!(
            EngagementPipeline::new(config),
            Err(ComputeError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_analyze_cohort_report() {
        let json = analyze_cohort(&instagram_json(), AnalysisConfig::engagement_default()).unwrap();
        let report: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(report["producer"]["name"], "engagement-flux");
        assert_eq!(report["flavor"]["kind"], "engagement");
        assert_eq!(report["entities"].as_array().unwrap().len(), 4);
        assert_eq!(report["entities"][3]["status"], "failed");
        assert!(report["portfolio"]["risk"]["level"].is_string());
    }

    #[test]
    fn test_invalid_json() {
        assert!(analyze_cohort("not valid json", AnalysisConfig::default()).is_err());
    }
}
