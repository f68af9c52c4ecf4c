//! Analysis configuration
//!
//! Everything a run needs besides its input: the scoring flavor and primary
//! counter, the weight configuration, the classification policy, the label
//! set, and the portfolio risk cut points and recommendation limits. Values
//! are passed into each stage; nothing here is global.

use crate::classifier::{ClassificationPolicy, LabelSet};
use crate::error::ComputeError;
use crate::portfolio::{RecommendationLimits, RiskThresholds};
use crate::scoring::WeightConfig;
use crate::types::{Counter, Flavor};
use serde::{Deserialize, Serialize};

/// Complete configuration for one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub flavor: Flavor,
    pub weights: WeightConfig,
    #[serde(default)]
    pub policy: ClassificationPolicy,
    #[serde(default)]
    pub labels: LabelSet,
    #[serde(default)]
    pub risk: RiskThresholds,
    #[serde(default)]
    pub limits: RecommendationLimits,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::engagement_default()
    }
}

impl AnalysisConfig {
    /// Single-counter engagement analysis on likes with market labels
    pub fn engagement_default() -> Self {
        Self {
            flavor: Flavor::Engagement {
                counter: Counter::Likes,
            },
            weights: WeightConfig::engagement_default(),
            policy: ClassificationPolicy::absolute(),
            labels: LabelSet::Market,
            risk: RiskThresholds::default(),
            limits: RecommendationLimits::default(),
        }
    }

    /// Multi-counter content analysis, percentile-ranked, with emotion labels
    pub fn content_default() -> Self {
        Self {
            flavor: Flavor::Content,
            weights: WeightConfig::content_default(),
            policy: ClassificationPolicy::percentile(),
            labels: LabelSet::Emotion,
            risk: RiskThresholds::default(),
            limits: RecommendationLimits::default(),
        }
    }

    /// Default configuration for a flavor name (`engagement` / `content`)
    pub fn for_flavor(name: &str) -> Result<Self, ComputeError> {
        match name {
            "engagement" => Ok(Self::engagement_default()),
            "content" => Ok(Self::content_default()),
            other => Err(ComputeError::ConfigurationError(format!(
                "unknown flavor '{other}' (expected engagement or content)"
            ))),
        }
    }

    /// Parse and validate a configuration
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ComputeError::ConfigurationError(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ComputeError> {
        serde_json::to_string_pretty(self).map_err(ComputeError::JsonError)
    }

    /// Check every part of the configuration against the flavor
    pub fn validate(&self) -> Result<(), ComputeError> {
        self.weights.validate(&self.flavor)?;
        self.policy.validate()?;
        self.risk.validate()?;
        Ok(())
    }

    /// Switch the primary counter (engagement flavor only)
    pub fn with_counter(mut self, counter: Counter) -> Result<Self, ComputeError> {
        match &mut self.flavor {
            Flavor::Engagement { counter: current } => {
                *current = counter;
                Ok(self)
            }
            Flavor::Content => Err(ComputeError::ConfigurationError(
                "the content flavor reads views, likes, comments and shares; it has no primary counter"
                    .to_string(),
            )),
        }
    }

    pub fn with_policy(mut self, policy: ClassificationPolicy) -> Self {
        self.policy = policy;
        self
    }
}
