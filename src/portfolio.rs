//! Portfolio aggregation
//!
//! Cohort-level view over one run's scored entities: a risk level from mean
//! volatility against mean consistency, ranked recommendation lists, and the
//! share of the cohort in each sentiment category. Failed entities never
//! enter the aggregates; they are listed as excluded.

use crate::classifier::LabelSet;
use crate::error::ComputeError;
use crate::types::{
    CategoryShare, CompositeResult, EntityOutcome, PortfolioRisk, PortfolioSummary,
    Recommendations, RiskLevel, Sentiment,
};
use serde::{Deserialize, Serialize};

/// Risk-score cut points: below `low` is Low, below `medium` is Medium
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub low: f64,
    pub medium: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            low: 0.2,
            medium: 0.5,
        }
    }
}

impl RiskThresholds {
    pub fn validate(&self) -> Result<(), ComputeError> {
        if !self.low.is_finite() || !self.medium.is_finite() || self.low >= self.medium {
            return Err(ComputeError::ConfigurationError(format!(
                "risk thresholds must be finite with low < medium, got {} / {}",
                self.low, self.medium
            )));
        }
        Ok(())
    }

    pub fn level(&self, score: f64) -> RiskLevel {
        if score < self.low {
            RiskLevel::Low
        } else if score < self.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

/// Maximum length of each bounded recommendation list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationLimits {
    pub top_performers: usize,
    pub emerging: usize,
    pub value_picks: usize,
}

impl Default for RecommendationLimits {
    fn default() -> Self {
        Self {
            top_performers: 5,
            emerging: 3,
            value_picks: 3,
        }
    }
}

/// Builds the portfolio summary for one cohort
#[derive(Debug, Clone, Default)]
pub struct PortfolioAggregator {
    risk: RiskThresholds,
    limits: RecommendationLimits,
    labels: LabelSet,
}

impl PortfolioAggregator {
    pub fn new(
        risk: RiskThresholds,
        limits: RecommendationLimits,
        labels: LabelSet,
    ) -> Result<Self, ComputeError> {
        risk.validate()?;
        Ok(Self {
            risk,
            limits,
            labels,
        })
    }

    /// Aggregate a run's outcomes
    ///
    /// # Errors
    /// `CohortEmpty` when no entity was scored.
    pub fn aggregate(&self, outcomes: &[EntityOutcome]) -> Result<PortfolioSummary, ComputeError> {
        let scored: Vec<&CompositeResult> =
            outcomes.iter().filter_map(EntityOutcome::as_scored).collect();
        let excluded: Vec<String> = outcomes
            .iter()
            .filter(|o| o.as_scored().is_none())
            .map(|o| o.id().to_string())
            .collect();

        if scored.is_empty() {
            return Err(ComputeError::CohortEmpty(format!(
                "no scored entities to aggregate ({} excluded)",
                excluded.len()
            )));
        }

        Ok(PortfolioSummary {
            risk: self.assess_risk(&scored)?,
            recommendations: self.recommend(&scored),
            distribution: self.distribution(&scored),
            excluded,
        })
    }

    /// Ratio of mean volatility to mean consistency, mapped to a level
    pub fn assess_risk(&self, results: &[&CompositeResult]) -> Result<PortfolioRisk, ComputeError> {
        if results.is_empty() {
            return Err(ComputeError::CohortEmpty(
                "risk needs at least one scored entity".to_string(),
            ));
        }
        let n = results.len() as f64;
        let mean_volatility = results.iter().map(|r| r.metrics.volatility()).sum::<f64>() / n;
        let mean_consistency = results.iter().map(|r| r.metrics.consistency()).sum::<f64>() / n;

        // No consistency at all is maximal risk with no meaningful ratio
        if mean_consistency <= 0.0 {
            return Ok(PortfolioRisk {
                level: RiskLevel::High,
                score: None,
                mean_volatility,
                mean_consistency,
            });
        }

        let score = mean_volatility / mean_consistency;
        Ok(PortfolioRisk {
            level: self.risk.level(score),
            score: Some(score),
            mean_volatility,
            mean_consistency,
        })
    }

    /// Ranked recommendation lists
    pub fn recommend(&self, results: &[&CompositeResult]) -> Recommendations {
        let ranked = rank(results);
        let ids = |filter: &dyn Fn(&CompositeResult) -> bool, limit: usize| -> Vec<String> {
            ranked
                .iter()
                .filter(|r| filter(**r))
                .take(limit)
                .map(|r| r.id.clone())
                .collect()
        };

        Recommendations {
            top_performers: ids(&|_| true, self.limits.top_performers),
            emerging: ids(&|r| r.sentiment == Sentiment::Positive, self.limits.emerging),
            value_picks: ids(
                &|r| r.sentiment == Sentiment::Neutral && r.metrics.growth() > 0.0,
                self.limits.value_picks,
            ),
            avoid: ids(&|r| r.sentiment.is_negative(), usize::MAX),
        }
    }

    /// Count and percentage per category, best category first
    pub fn distribution(&self, results: &[&CompositeResult]) -> Vec<CategoryShare> {
        let total = results.len();
        Sentiment::DESCENDING
            .iter()
            .map(|sentiment| {
                let count = results.iter().filter(|r| r.sentiment == *sentiment).count();
                let percentage = if total == 0 {
                    0.0
                } else {
                    count as f64 / total as f64 * 100.0
                };
                CategoryShare {
                    sentiment: *sentiment,
                    label: self.labels.label(*sentiment).to_string(),
                    count,
                    percentage,
                }
            })
            .collect()
    }
}

/// Sort by composite score descending, ties by id ascending
fn rank<'a>(results: &[&'a CompositeResult]) -> Vec<&'a CompositeResult> {
    let mut ranked = results.to_vec();
    ranked.sort_by(|a, b| {
        b.composite_score
            .total_cmp(&a.composite_score)
            .then_with(|| a.id.cmp(&b.id))
    });
    ranked
}
