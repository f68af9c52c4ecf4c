//! Composite scoring
//!
//! Collapses an entity's metrics into one scalar using a named, versioned
//! weight configuration. Each term picks a metric, a weight and an optional
//! complement transform (`1 - value`) for metrics where lower is better.

use crate::error::ComputeError;
use crate::types::{EntityMetrics, Flavor, MetricKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Transform applied to a metric value before weighting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermTransform {
    #[default]
    Identity,
    /// `1 - value`
    Complement,
}

impl TermTransform {
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            TermTransform::Identity => value,
            TermTransform::Complement => 1.0 - value,
        }
    }
}

/// One weighted term of the composite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightTerm {
    pub metric: MetricKey,
    pub weight: f64,
    #[serde(default)]
    pub transform: TermTransform,
}

impl WeightTerm {
    pub fn new(metric: MetricKey, weight: f64) -> Self {
        Self {
            metric,
            weight,
            transform: TermTransform::Identity,
        }
    }

    pub fn complement(metric: MetricKey, weight: f64) -> Self {
        Self {
            metric,
            weight,
            transform: TermTransform::Complement,
        }
    }
}

/// Named, versioned weight configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightConfig {
    pub name: String,
    pub version: u32,
    pub terms: Vec<WeightTerm>,
}

impl WeightConfig {
    /// Default weights for the engagement flavor
    pub fn engagement_default() -> Self {
        Self {
            name: "engagement-default".to_string(),
            version: 1,
            terms: vec![
                WeightTerm::new(MetricKey::MomentumScore, 0.25),
                WeightTerm::new(MetricKey::ConsistencyRatio, 0.20),
                WeightTerm::new(MetricKey::GrowthTrajectory, 0.20),
                WeightTerm::new(MetricKey::AudienceRetentionScore, 0.15),
                WeightTerm::new(MetricKey::EngagementVelocity, 0.10),
                WeightTerm::complement(MetricKey::VolatilityIndex, 0.10),
            ],
        }
    }

    /// Default weights for the content flavor
    pub fn content_default() -> Self {
        Self {
            name: "content-default".to_string(),
            version: 1,
            terms: vec![
                WeightTerm::new(MetricKey::EngagementVelocity, 0.35),
                WeightTerm::new(MetricKey::ViralCoefficient, 0.25),
                WeightTerm::new(MetricKey::AudienceRetention, 0.20),
                WeightTerm::new(MetricKey::GrowthMomentum, 0.20),
            ],
        }
    }

    /// Default weights for a flavor
    pub fn default_for(flavor: &Flavor) -> Self {
        match flavor {
            Flavor::Engagement { .. } => Self::engagement_default(),
            Flavor::Content => Self::content_default(),
        }
    }

    /// Metric keys a configuration for this flavor must weight
    pub fn required_metrics(flavor: &Flavor) -> Vec<MetricKey> {
        Self::default_for(flavor)
            .terms
            .iter()
            .map(|t| t.metric)
            .collect()
    }

    /// Parse a weight configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        serde_json::from_str(json)
            .map_err(|e| ComputeError::ConfigurationError(format!("weight config: {e}")))
    }

    /// Check the configuration against a flavor
    pub fn validate(&self, flavor: &Flavor) -> Result<(), ComputeError> {
        let produced = flavor.metric_keys();
        let mut seen = BTreeSet::new();

        for term in &self.terms {
            if !produced.contains(&term.metric) {
                return Err(ComputeError::ConfigurationError(format!(
                    "{} is not produced by the {} flavor",
                    term.metric,
                    flavor.as_str()
                )));
            }
            if !seen.insert(term.metric) {
                return Err(ComputeError::ConfigurationError(format!(
                    "{} is weighted more than once",
                    term.metric
                )));
            }
            if !term.weight.is_finite() || term.weight < 0.0 {
                return Err(ComputeError::ConfigurationError(format!(
                    "weight for {} must be finite and non-negative, got {}",
                    term.metric, term.weight
                )));
            }
        }

        if let Some(missing) = Self::required_metrics(flavor)
            .into_iter()
            .find(|key| !seen.contains(key))
        {
            return Err(ComputeError::ConfigurationError(format!(
                "required metric {missing} has no weight"
            )));
        }

        Ok(())
    }
}

/// Weighted-sum scorer bound to a validated configuration
#[derive(Debug, Clone)]
pub struct CompositeScorer {
    config: WeightConfig,
}

impl CompositeScorer {
    /// Validate `config` for `flavor` and build a scorer
    pub fn new(config: WeightConfig, flavor: &Flavor) -> Result<Self, ComputeError> {
        config.validate(flavor)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &WeightConfig {
        &self.config
    }

    /// `sum(weight * transform(value))` over every term
    ///
    /// A term whose metric the given record does not carry contributes 0; a
    /// validated scorer only meets that case when handed metrics of another
    /// flavor.
    pub fn score(&self, metrics: &EntityMetrics) -> f64 {
        self.config
            .terms
            .iter()
            .map(|term| {
                let value = metrics.get(term.metric).unwrap_or(0.0);
                term.weight * term.transform.apply(value)
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentMetrics, Counter, MetricSet};
    use pretty_assertions::assert_eq;

    fn engagement() -> Flavor {
        Flavor::Engagement {
            counter: Counter::Likes,
        }
    }

    fn sample_metrics() -> EntityMetrics {
        EntityMetrics::Engagement(MetricSet {
            engagement_velocity: 0.5,
            volatility_index: 0.3,
            momentum_score: 0.4,
            consistency_ratio: 0.7,
            peak_performance_index: 1.6,
            temporal_correlation: 0.2,
            growth_trajectory: 0.1,
            audience_retention_score: 0.8,
        })
    }

    #[test]
    fn test_engagement_default_score() {
        let scorer = CompositeScorer::new(WeightConfig::engagement_default(), &engagement()).unwrap();
        let expected = 0.25 * 0.4 + 0.20 * 0.7 + 0.20 * 0.1 + 0.15 * 0.8 + 0.10 * 0.5 + 0.10 * (1.0 - 0.3);
        assert!((scorer.score(&sample_metrics()) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_content_default_score() {
        let scorer = CompositeScorer::new(WeightConfig::content_default(), &Flavor::Content).unwrap();
        let metrics = EntityMetrics::Content(ContentMetrics {
            engagement_velocity: 0.02,
            viral_coefficient: 0.01,
            audience_retention: 0.3,
            growth_momentum: -0.1,
            ..ContentMetrics::default()
        });
        let expected = 0.35 * 0.02 + 0.25 * 0.01 + 0.20 * 0.3 + 0.20 * -0.1;
        assert!((scorer.score(&metrics) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_all_zero_metrics_score_only_the_complement() {
        let scorer = CompositeScorer::new(WeightConfig::engagement_default(), &engagement()).unwrap();
        let score = scorer.score(&EntityMetrics::Engagement(MetricSet::default()));
        assert!((score - 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_scaling_weights_scales_score() {
        let content = Flavor::Content;
        let base = WeightConfig::content_default();
        let mut scaled = base.clone();
        for term in &mut scaled.terms {
            term.weight *= 3.0;
        }

        let metrics = EntityMetrics::Content(ContentMetrics {
            engagement_velocity: 0.2,
            viral_coefficient: 0.05,
            audience_retention: 0.4,
            growth_momentum: 0.3,
            ..ContentMetrics::default()
        });

        let a = CompositeScorer::new(base, &content).unwrap().score(&metrics);
        let b = CompositeScorer::new(scaled, &content).unwrap().score(&metrics);
        assert!((b - 3.0 * a).abs() < 1e-12);
    }

    #[test]
    fn test_missing_required_metric_is_rejected() {
        let mut config = WeightConfig::engagement_default();
        config.terms.retain(|t| t.metric != MetricKey::MomentumScore);
        let err = CompositeScorer::new(config, &engagement()).unwrap_err();
        assert!(matches!(err, ComputeError::ConfigurationError(ref m) if m.contains("momentum_score")));
    }

    #[test]
    fn test_foreign_metric_is_rejected() {
        let mut config = WeightConfig::content_default();
        config.terms.push(WeightTerm::new(MetricKey::VolatilityIndex, 0.1));
        assert!(matches!(
            CompositeScorer::new(config, &Flavor::Content),
            Err(ComputeError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_duplicate_and_negative_weights_are_rejected() {
        let mut duplicate = WeightConfig::content_default();
        duplicate
            .terms
            .push(WeightTerm::new(MetricKey::GrowthMomentum, 0.1));
        assert!(CompositeScorer::new(duplicate, &Flavor::Content).is_err());

        let mut negative = WeightConfig::content_default();
        negative.terms[0].weight = -0.35;
        assert!(CompositeScorer::new(negative, &Flavor::Content).is_err());

        let mut nan = WeightConfig::content_default();
        nan.terms[1].weight = f64::NAN;
        assert!(CompositeScorer::new(nan, &Flavor::Content).is_err());
    }

    #[test]
    fn test_optional_metrics_may_be_added() {
        let mut config = WeightConfig::engagement_default();
        config
            .terms
            .push(WeightTerm::new(MetricKey::PeakPerformanceIndex, 0.05));
        let scorer = CompositeScorer::new(config, &engagement()).unwrap();
        let base = CompositeScorer::new(WeightConfig::engagement_default(), &engagement())
            .unwrap()
            .score(&sample_metrics());
        assert!((scorer.score(&sample_metrics()) - (base + 0.05 * 1.6)).abs() < 1e-12);
    }

    #[test]
    fn test_config_json() {
        let json = r#"{
            "name": "custom",
            "version": 2,
            "terms": [
                {"metric": "engagement_velocity", "weight": 0.5},
                {"metric": "viral_coefficient", "weight": 0.2},
                {"metric": "audience_retention", "weight": 0.2},
                {"metric": "growth_momentum", "weight": 0.1, "transform": "identity"}
            ]
        }"#;
        let config = WeightConfig::from_json(json).unwrap();
        assert_eq!(config.version, 2);
        assert_eq!(config.terms[0].transform, TermTransform::Identity);
        config.validate(&Flavor::Content).unwrap();

        let unknown = r#"{"name":"x","version":1,"terms":[{"metric":"likes_per_hour","weight":1.0}]}"#;
        assert!(matches!(
            WeightConfig::from_json(unknown),
            Err(ComputeError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_default_serializes_complement() {
        let json = serde_json::to_value(WeightConfig::engagement_default()).unwrap();
        assert_eq!(json["terms"][5]["metric"], "volatility_index");
        assert_eq!(json["terms"][5]["transform"], "complement");
    }
}
