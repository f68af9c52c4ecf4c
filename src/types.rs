//! Core types for the Engagement Flux pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: ingested entity records, per-event temporal features, derived metric
//! sets, per-entity composite results and the cohort-level portfolio summary.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Named interaction counter carried by an event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    Likes,
    Comments,
    Shares,
    Views,
    /// For platform-specific counters (saves, retweets, ...)
    #[serde(untagged)]
    Custom(String),
}

impl Counter {
    /// Counters whose values are validated strictly at ingestion
    pub const KNOWN: [Counter; 4] = [
        Counter::Likes,
        Counter::Comments,
        Counter::Shares,
        Counter::Views,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Counter::Likes => "likes",
            Counter::Comments => "comments",
            Counter::Shares => "shares",
            Counter::Views => "views",
            Counter::Custom(name) => name.as_str(),
        }
    }

    /// Parse a counter name, mapping unknown names to `Custom`
    pub fn from_name(name: &str) -> Self {
        match name {
            "likes" => Counter::Likes,
            "comments" => Counter::Comments,
            "shares" => Counter::Shares,
            "views" => Counter::Views,
            other => Counter::Custom(other.to_string()),
        }
    }
}

impl Default for Counter {
    fn default() -> Self {
        Counter::Likes
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One post / video / tweet with its interaction counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    /// When the content was published, in the offset it was stamped with
    pub timestamp: DateTime<FixedOffset>,
    /// Counter name -> non-negative count
    pub interaction_counts: BTreeMap<String, u64>,
    /// Optional title (videos)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl InteractionEvent {
    /// Value of a counter on this event; absent counters read as zero
    pub fn count(&self, counter: &Counter) -> u64 {
        self.interaction_counts
            .get(counter.as_str())
            .copied()
            .unwrap_or(0)
    }
}

/// One analyzed account / creator with its chronologically ordered events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Unique entity identifier (username, channel name, ...)
    pub id: String,
    /// Events in publication order; the order is never changed downstream
    pub events: Vec<InteractionEvent>,
}

impl EntityRecord {
    /// Values of one counter across the event sequence, in order
    pub fn series(&self, counter: &Counter) -> Vec<f64> {
        self.events
            .iter()
            .map(|e| e.count(counter) as f64)
            .collect()
    }
}

/// Calendar attributes derived from one event timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalFeatures {
    /// Hour of day (0-23)
    pub hour: u32,
    /// Day of week (Monday = 0 .. Sunday = 6)
    pub day_of_week: u32,
    /// Month (1-12)
    pub month: u32,
    /// Saturday or Sunday
    pub is_weekend: bool,
    /// Calendar quarter (1-4)
    pub quarter: u32,
}

/// Closed set of metric names across both scoring flavors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    // Engagement flavor
    EngagementVelocity,
    VolatilityIndex,
    MomentumScore,
    ConsistencyRatio,
    PeakPerformanceIndex,
    TemporalCorrelation,
    GrowthTrajectory,
    AudienceRetentionScore,

    // Content flavor (engagement_velocity is shared by name)
    ViralCoefficient,
    AudienceRetention,
    GrowthMomentum,
}

impl MetricKey {
    /// Metrics produced by the engagement flavor, in vector order
    pub const ENGAGEMENT: [MetricKey; 8] = [
        MetricKey::EngagementVelocity,
        MetricKey::VolatilityIndex,
        MetricKey::MomentumScore,
        MetricKey::ConsistencyRatio,
        MetricKey::PeakPerformanceIndex,
        MetricKey::TemporalCorrelation,
        MetricKey::GrowthTrajectory,
        MetricKey::AudienceRetentionScore,
    ];

    /// Metrics produced by the content flavor, in vector order
    pub const CONTENT: [MetricKey; 4] = [
        MetricKey::EngagementVelocity,
        MetricKey::ViralCoefficient,
        MetricKey::AudienceRetention,
        MetricKey::GrowthMomentum,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKey::EngagementVelocity => "engagement_velocity",
            MetricKey::VolatilityIndex => "volatility_index",
            MetricKey::MomentumScore => "momentum_score",
            MetricKey::ConsistencyRatio => "consistency_ratio",
            MetricKey::PeakPerformanceIndex => "peak_performance_index",
            MetricKey::TemporalCorrelation => "temporal_correlation",
            MetricKey::GrowthTrajectory => "growth_trajectory",
            MetricKey::AudienceRetentionScore => "audience_retention_score",
            MetricKey::ViralCoefficient => "viral_coefficient",
            MetricKey::AudienceRetention => "audience_retention",
            MetricKey::GrowthMomentum => "growth_momentum",
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived metrics for the engagement (single-counter) flavor
///
/// Every field is always populated; degenerate sequences yield 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    pub engagement_velocity: f64,
    pub volatility_index: f64,
    pub momentum_score: f64,
    pub consistency_ratio: f64,
    pub peak_performance_index: f64,
    pub temporal_correlation: f64,
    pub growth_trajectory: f64,
    pub audience_retention_score: f64,
}

impl MetricSet {
    pub fn get(&self, key: MetricKey) -> Option<f64> {
        match key {
            MetricKey::EngagementVelocity => Some(self.engagement_velocity),
            MetricKey::VolatilityIndex => Some(self.volatility_index),
            MetricKey::MomentumScore => Some(self.momentum_score),
            MetricKey::ConsistencyRatio => Some(self.consistency_ratio),
            MetricKey::PeakPerformanceIndex => Some(self.peak_performance_index),
            MetricKey::TemporalCorrelation => Some(self.temporal_correlation),
            MetricKey::GrowthTrajectory => Some(self.growth_trajectory),
            MetricKey::AudienceRetentionScore => Some(self.audience_retention_score),
            _ => None,
        }
    }
}

/// Multi-counter feature vector for the content flavor
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentFeatures {
    /// Mean views per event
    pub mean_views: f64,
    /// Population standard deviation of views
    pub std_views: f64,
    /// Mean of (likes + comments + shares) / max(views, 1)
    pub mean_interaction_rate: f64,
    /// Standard deviation of the interaction rate
    pub std_interaction_rate: f64,
    pub mean_like_rate: f64,
    pub mean_comment_rate: f64,
    pub mean_share_rate: f64,
    /// Interquartile range of views
    pub views_iqr: f64,
    pub event_count: f64,
    pub total_views: f64,
    /// Pearson correlation between views and total interactions
    pub views_interaction_correlation: f64,
    /// Mean first difference of views
    pub mean_view_change: f64,
}

impl ContentFeatures {
    pub fn to_array(&self) -> [f64; 12] {
        [
            self.mean_views,
            self.std_views,
            self.mean_interaction_rate,
            self.std_interaction_rate,
            self.mean_like_rate,
            self.mean_comment_rate,
            self.mean_share_rate,
            self.views_iqr,
            self.event_count,
            self.total_views,
            self.views_interaction_correlation,
            self.mean_view_change,
        ]
    }
}

/// Derived metrics for the content (multi-counter) flavor
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentMetrics {
    pub features: ContentFeatures,
    pub viral_coefficient: f64,
    pub engagement_velocity: f64,
    pub audience_retention: f64,
    pub growth_momentum: f64,
}

impl ContentMetrics {
    pub fn get(&self, key: MetricKey) -> Option<f64> {
        match key {
            MetricKey::EngagementVelocity => Some(self.engagement_velocity),
            MetricKey::ViralCoefficient => Some(self.viral_coefficient),
            MetricKey::AudienceRetention => Some(self.audience_retention),
            MetricKey::GrowthMomentum => Some(self.growth_momentum),
            _ => None,
        }
    }

    /// Coefficient of variation of views (0 when mean views is not positive)
    pub fn view_volatility(&self) -> f64 {
        if self.features.mean_views > 0.0 {
            self.features.std_views / self.features.mean_views
        } else {
            0.0
        }
    }

    /// 1 / (1 + view volatility); 0 for fewer than two events or no views
    pub fn view_consistency(&self) -> f64 {
        if self.features.event_count < 2.0 || self.features.mean_views <= 0.0 {
            return 0.0;
        }
        1.0 / (1.0 + self.view_volatility())
    }
}

/// Scoring flavor and its input counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Flavor {
    /// Single designated counter (default likes), eight-metric table
    Engagement {
        #[serde(default)]
        counter: Counter,
    },
    /// Views / likes / comments / shares feature vector
    Content,
}

impl Flavor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flavor::Engagement { .. } => "engagement",
            Flavor::Content => "content",
        }
    }

    /// Metric keys this flavor produces
    pub fn metric_keys(&self) -> &'static [MetricKey] {
        match self {
            Flavor::Engagement { .. } => &MetricKey::ENGAGEMENT,
            Flavor::Content => &MetricKey::CONTENT,
        }
    }
}

/// Metrics of one entity, tagged by flavor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "flavor", rename_all = "snake_case")]
pub enum EntityMetrics {
    Engagement(MetricSet),
    Content(ContentMetrics),
}

impl EntityMetrics {
    /// Value of a metric, or `None` if this flavor does not produce it
    pub fn get(&self, key: MetricKey) -> Option<f64> {
        match self {
            EntityMetrics::Engagement(m) => m.get(key),
            EntityMetrics::Content(m) => m.get(key),
        }
    }

    /// Volatility input for portfolio risk
    pub fn volatility(&self) -> f64 {
        match self {
            EntityMetrics::Engagement(m) => m.volatility_index,
            EntityMetrics::Content(m) => m.view_volatility(),
        }
    }

    /// Consistency input for portfolio risk
    pub fn consistency(&self) -> f64 {
        match self {
            EntityMetrics::Engagement(m) => m.consistency_ratio,
            EntityMetrics::Content(m) => m.view_consistency(),
        }
    }

    /// Growth signal used to select value picks
    pub fn growth(&self) -> f64 {
        match self {
            EntityMetrics::Engagement(m) => m.growth_trajectory,
            EntityMetrics::Content(m) => m.growth_momentum,
        }
    }
}

/// Five ordered sentiment categories (declaration order is ascending)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    ExtremeNegative,
    Negative,
    Neutral,
    Positive,
    ExtremePositive,
}

impl Sentiment {
    /// Categories from best to worst
    pub const DESCENDING: [Sentiment; 5] = [
        Sentiment::ExtremePositive,
        Sentiment::Positive,
        Sentiment::Neutral,
        Sentiment::Negative,
        Sentiment::ExtremeNegative,
    ];

    pub fn is_negative(&self) -> bool {
        matches!(self, Sentiment::Negative | Sentiment::ExtremeNegative)
    }
}

/// Scored outcome for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeResult {
    pub id: String,
    pub metrics: EntityMetrics,
    pub composite_score: f64,
    pub sentiment: Sentiment,
    /// Deployment label for `sentiment` ("Bullish", "Greed", ...)
    pub label: String,
}

/// Per-entity outcome of a run: scored, or failed with an explicit marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntityOutcome {
    Scored(CompositeResult),
    Failed { id: String, error: String },
}

impl EntityOutcome {
    pub fn id(&self) -> &str {
        match self {
            EntityOutcome::Scored(r) => &r.id,
            EntityOutcome::Failed { id, .. } => id,
        }
    }

    pub fn as_scored(&self) -> Option<&CompositeResult> {
        match self {
            EntityOutcome::Scored(r) => Some(r),
            EntityOutcome::Failed { .. } => None,
        }
    }
}

/// Cohort risk classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low Risk",
            RiskLevel::Medium => "Medium Risk",
            RiskLevel::High => "High Risk",
        }
    }
}

/// Risk level with the ratio that produced it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioRisk {
    pub level: RiskLevel,
    /// mean volatility / mean consistency; `None` when mean consistency is 0
    pub score: Option<f64>,
    pub mean_volatility: f64,
    pub mean_consistency: f64,
}

/// Ranked recommendation lists (entity ids, best first)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendations {
    pub top_performers: Vec<String>,
    pub emerging: Vec<String>,
    pub value_picks: Vec<String>,
    pub avoid: Vec<String>,
}

/// Share of the cohort in one sentiment category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    pub sentiment: Sentiment,
    pub label: String,
    pub count: usize,
    pub percentage: f64,
}

/// Cohort-level aggregates for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub risk: PortfolioRisk,
    pub recommendations: Recommendations,
    pub distribution: Vec<CategoryShare>,
    /// Entities left out of aggregation because they failed
    pub excluded: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_serialization() {
        assert_eq!(serde_json::to_string(&Counter::Views).unwrap(), "\"views\"");
        let custom: Counter = serde_json::from_str("\"saves\"").unwrap();
        assert_eq!(custom, Counter::Custom("saves".to_string()));
        assert_eq!(Counter::from_name("likes"), Counter::Likes);
    }

    #[test]
    fn test_missing_counter_reads_as_zero() {
        let event: InteractionEvent = serde_json::from_str(
            r#"{
                "timestamp": "2024-01-15T14:00:00Z",
                "interaction_counts": { "likes": 12 }
            }"#,
        )
        .unwrap();
        assert_eq!(event.count(&Counter::Likes), 12);
        assert_eq!(event.count(&Counter::Views), 0);
    }

    #[test]
    fn test_sentiment_ordering() {
        assert!(Sentiment::ExtremePositive > Sentiment::Positive);
        assert!(Sentiment::Neutral > Sentiment::Negative);
        assert!(Sentiment::Negative > Sentiment::ExtremeNegative);
        assert!(Sentiment::ExtremeNegative.is_negative());
        assert!(!Sentiment::Neutral.is_negative());
    }

    #[test]
    fn test_metric_key_names_round_trip_through_serde() {
        for key in MetricKey::ENGAGEMENT.iter().chain(MetricKey::CONTENT.iter()) {
            let json = serde_json::to_string(key).unwrap();
            assert_eq!(json, format!("\"{}\"", key.as_str()));
        }
    }

    #[test]
    fn test_metric_set_rejects_content_keys() {
        let metrics = MetricSet::default();
        assert_eq!(metrics.get(MetricKey::MomentumScore), Some(0.0));
        assert_eq!(metrics.get(MetricKey::ViralCoefficient), None);
    }

    #[test]
    fn test_flavor_serialization() {
        let flavor = Flavor::Engagement {
            counter: Counter::Views,
        };
        let json = serde_json::to_string(&flavor).unwrap();
        assert_eq!(json, r#"{"kind":"engagement","counter":"views"}"#);

        let parsed: Flavor = serde_json::from_str(r#"{"kind":"engagement"}"#).unwrap();
        assert_eq!(
            parsed,
            Flavor::Engagement {
                counter: Counter::Likes
            }
        );

        let content: Flavor = serde_json::from_str(r#"{"kind":"content"}"#).unwrap();
        assert_eq!(content, Flavor::Content);
    }

    #[test]
    fn test_content_view_consistency_needs_two_events() {
        let mut metrics = ContentMetrics::default();
        metrics.features.mean_views = 100.0;
        metrics.features.std_views = 0.0;
        metrics.features.event_count = 1.0;
        assert_eq!(metrics.view_consistency(), 0.0);

        metrics.features.event_count = 3.0;
        assert_eq!(metrics.view_consistency(), 1.0);
    }
}
