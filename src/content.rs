//! Content-creator feature vector and second-order metrics
//!
//! Builds a twelve-element feature vector from the views, likes, comments and
//! shares of every event, then combines it into four bounded metrics:
//! viral coefficient, engagement velocity, audience retention and growth
//! momentum. Scale terms are log-dampened and trend terms are tanh-bounded so
//! cohort ranking is driven by relative ordering rather than raw magnitude.

use crate::stats;
use crate::types::{ContentFeatures, ContentMetrics, Counter, EntityRecord};

/// Floor applied to denominators that count views
const MIN_VIEWS_DENOMINATOR: f64 = 1.0;

/// Floor applied to the like rate when it divides the comment rate
const MIN_LIKE_RATE: f64 = 0.001;

/// Feature extractor and metric deriver for the content flavor
pub struct ContentAnalyzer;

impl ContentAnalyzer {
    /// Extract features and derive the four content metrics for one entity
    pub fn derive(record: &EntityRecord) -> ContentMetrics {
        let features = Self::extract_features(record);
        Self::from_features(features)
    }

    /// Derive the content metrics from an already extracted feature vector
    pub fn from_features(features: ContentFeatures) -> ContentMetrics {
        ContentMetrics {
            viral_coefficient: stats::finite_or_zero(compute_viral_coefficient(&features)),
            engagement_velocity: stats::finite_or_zero(compute_engagement_velocity(&features)),
            audience_retention: stats::finite_or_zero(compute_audience_retention(&features)),
            growth_momentum: stats::finite_or_zero(compute_growth_momentum(&features)),
            features,
        }
    }

    /// Build the feature vector from the event sequence
    ///
    /// An entity without events gets the all-zero vector.
    pub fn extract_features(record: &EntityRecord) -> ContentFeatures {
        if record.events.is_empty() {
            return ContentFeatures::default();
        }

        let views = record.series(&Counter::Views);
        let likes = record.series(&Counter::Likes);
        let comments = record.series(&Counter::Comments);
        let shares = record.series(&Counter::Shares);

        let total: Vec<f64> = likes
            .iter()
            .zip(&comments)
            .zip(&shares)
            .map(|((l, c), s)| l + c + s)
            .collect();

        let rate = |numerators: &[f64]| -> Vec<f64> {
            numerators
                .iter()
                .zip(&views)
                .map(|(n, v)| n / v.max(MIN_VIEWS_DENOMINATOR))
                .collect()
        };
        let interaction_rate = rate(&total);

        let views_iqr = match (stats::percentile(&views, 75.0), stats::percentile(&views, 25.0)) {
            (Some(q3), Some(q1)) => q3 - q1,
            _ => 0.0,
        };

        let n = views.len();
        let views_interaction_correlation = if n > 1 {
            stats::pearson(&views, &total).unwrap_or(0.0)
        } else {
            0.0
        };
        let mean_view_change = if n > 1 {
            stats::mean(&stats::diffs(&views)).unwrap_or(0.0)
        } else {
            0.0
        };

        let features = ContentFeatures {
            mean_views: stats::mean(&views).unwrap_or(0.0),
            std_views: stats::std_dev(&views).unwrap_or(0.0),
            mean_interaction_rate: stats::mean(&interaction_rate).unwrap_or(0.0),
            std_interaction_rate: stats::std_dev(&interaction_rate).unwrap_or(0.0),
            mean_like_rate: stats::mean(&rate(&likes)).unwrap_or(0.0),
            mean_comment_rate: stats::mean(&rate(&comments)).unwrap_or(0.0),
            mean_share_rate: stats::mean(&rate(&shares)).unwrap_or(0.0),
            views_iqr,
            event_count: n as f64,
            total_views: views.iter().sum(),
            views_interaction_correlation,
            mean_view_change,
        };

        sanitize(features)
    }
}

/// Replace any non-finite feature with 0
fn sanitize(features: ContentFeatures) -> ContentFeatures {
    let f = features.to_array().map(stats::finite_or_zero);
    ContentFeatures {
        mean_views: f[0],
        std_views: f[1],
        mean_interaction_rate: f[2],
        std_interaction_rate: f[3],
        mean_like_rate: f[4],
        mean_comment_rate: f[5],
        mean_share_rate: f[6],
        views_iqr: f[7],
        event_count: f[8],
        total_views: f[9],
        views_interaction_correlation: f[10],
        mean_view_change: f[11],
    }
}

/// `tanh(mean view change / max(mean views, 1))`
fn view_trend(f: &ContentFeatures) -> f64 {
    (f.mean_view_change / f.mean_views.max(MIN_VIEWS_DENOMINATOR)).tanh()
}

/// Viral coefficient
///
/// Formula:
/// ```text
/// view_consistency  = 1 / (1 + std_views / max(mean_views, 1))
/// engagement_depth  = mean_interaction_rate * mean_share_rate
/// content_volume    = ln(1 + event_count)
/// viral             = view_consistency * engagement_depth * content_volume * (1 + trend)
/// ```
fn compute_viral_coefficient(f: &ContentFeatures) -> f64 {
    let view_consistency = 1.0 / (1.0 + f.std_views / f.mean_views.max(MIN_VIEWS_DENOMINATOR));
    let engagement_depth = f.mean_interaction_rate * f.mean_share_rate;
    let content_volume = f.event_count.ln_1p();
    view_consistency * engagement_depth * content_volume * (1.0 + view_trend(f))
}

/// Content engagement velocity
///
/// Formula:
/// ```text
/// mean_interaction_rate
///   * (like_rate + comment_rate + share_rate)
///   * ln(1 + mean_views) / 20
///   / (1 + std_interaction_rate)
/// ```
fn compute_engagement_velocity(f: &ContentFeatures) -> f64 {
    let interaction_diversity = f.mean_like_rate + f.mean_comment_rate + f.mean_share_rate;
    let audience_size_factor = f.mean_views.ln_1p() / 20.0;
    let consistency_bonus = 1.0 / (1.0 + f.std_interaction_rate);
    f.mean_interaction_rate * interaction_diversity * audience_size_factor * consistency_bonus
}

/// Content audience retention
///
/// Formula:
/// ```text
/// comment_rate / max(like_rate, 0.001)
///   / (1 + std_interaction_rate)
///   * tanh(event_count / 10)
/// ```
fn compute_audience_retention(f: &ContentFeatures) -> f64 {
    let comment_to_like_ratio = f.mean_comment_rate / f.mean_like_rate.max(MIN_LIKE_RATE);
    let engagement_stability = 1.0 / (1.0 + f.std_interaction_rate);
    let content_frequency = (f.event_count / 10.0).tanh();
    comment_to_like_ratio * engagement_stability * content_frequency
}

/// Growth momentum
///
/// Formula: `trend * ln(1 + total_views) / 25 * (1 + max(correlation, 0))`
fn compute_growth_momentum(f: &ContentFeatures) -> f64 {
    let reach_expansion = f.total_views.ln_1p() / 25.0;
    let engagement_correlation = f.views_interaction_correlation.max(0.0);
    view_trend(f) * reach_expansion * (1.0 + engagement_correlation)
}
