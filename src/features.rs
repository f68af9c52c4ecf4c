//! Engagement metric derivation
//!
//! This module derives the eight engagement metrics from one counter's value
//! sequence and the parallel temporal features:
//! - Velocity, volatility and momentum
//! - Consistency and peak performance
//! - Temporal correlation, growth trajectory and audience retention
//!
//! Every metric is a pure function of its inputs. Sequences too short for a
//! metric yield 0 for that metric.

use crate::stats;
use crate::temporal::features_for;
use crate::types::{Counter, EntityRecord, MetricSet, TemporalFeatures};

/// Number of trailing events treated as "recent" for momentum
const MOMENTUM_WINDOW: usize = 3;

/// Number of trailing events averaged for audience retention
const RETENTION_WINDOW: usize = 5;

/// Metric engine for the single-counter engagement flavor
pub struct MetricEngine;

impl MetricEngine {
    /// Derive metrics for one counter of an entity record
    pub fn derive(record: &EntityRecord, counter: &Counter) -> MetricSet {
        let values = record.series(counter);
        let timestamps: Vec<_> = record.events.iter().map(|e| e.timestamp).collect();
        Self::compute(&values, &features_for(&timestamps))
    }

    /// Derive metrics from a value sequence and its temporal features
    pub fn compute(values: &[f64], temporal: &[TemporalFeatures]) -> MetricSet {
        MetricSet {
            engagement_velocity: compute_engagement_velocity(values),
            volatility_index: compute_volatility_index(values),
            momentum_score: compute_momentum_score(values),
            consistency_ratio: compute_consistency_ratio(values),
            peak_performance_index: compute_peak_performance_index(values),
            temporal_correlation: compute_temporal_correlation(temporal, values),
            growth_trajectory: compute_growth_trajectory(values),
            audience_retention_score: compute_audience_retention_score(values),
        }
    }
}

/// Mean of consecutive first differences
fn compute_engagement_velocity(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    stats::mean(&stats::diffs(values)).unwrap_or(0.0)
}

/// Coefficient of variation: `stdev / mean`
fn compute_volatility_index(values: &[f64]) -> f64 {
    match (stats::mean(values), stats::std_dev(values)) {
        (Some(mean), Some(sd)) if mean > 0.0 => sd / mean,
        _ => 0.0,
    }
}

/// Relative change of the last three values against everything before them
///
/// Formula: `(mean(last 3) - mean(history)) / mean(history)` where history is
/// all but the last three values, or the whole sequence when n <= 3.
fn compute_momentum_score(values: &[f64]) -> f64 {
    let n = values.len();
    if n < MOMENTUM_WINDOW {
        return 0.0;
    }
    let split = n - MOMENTUM_WINDOW;
    let recent = stats::mean(&values[split..]).unwrap_or(0.0);
    let historical = if n > MOMENTUM_WINDOW {
        stats::mean(&values[..split]).unwrap_or(0.0)
    } else {
        stats::mean(values).unwrap_or(0.0)
    };

    if historical > 0.0 {
        (recent - historical) / historical
    } else {
        0.0
    }
}

/// Consistency: `1 / (1 + CV)`
///
/// A non-positive mean makes the CV infinite, so the ratio goes to 0.
fn compute_consistency_ratio(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    match (stats::mean(values), stats::std_dev(values)) {
        (Some(mean), Some(sd)) if mean > 0.0 => 1.0 / (1.0 + sd / mean),
        _ => 0.0,
    }
}

/// Peak index: `max / mean`
fn compute_peak_performance_index(values: &[f64]) -> f64 {
    match (stats::max(values), stats::mean(values)) {
        (Some(max), Some(mean)) if mean > 0.0 => max / mean,
        _ => 0.0,
    }
}

/// Mean absolute Pearson correlation between each temporal attribute and the values
///
/// Attributes that are constant across the sequence have no defined
/// correlation and are left out of the mean.
fn compute_temporal_correlation(temporal: &[TemporalFeatures], values: &[f64]) -> f64 {
    if values.is_empty() || temporal.len() != values.len() {
        return 0.0;
    }

    let rows: Vec<[f64; 5]> = temporal.iter().map(TemporalFeatures::as_vector).collect();
    let correlations: Vec<f64> = (0..5)
        .filter_map(|col| {
            let column: Vec<f64> = rows.iter().map(|row| row[col]).collect();
            stats::pearson(&column, values).map(f64::abs)
        })
        .collect();

    stats::mean(&correlations).unwrap_or(0.0)
}

/// Least-squares slope against index, normalized by the mean
fn compute_growth_trajectory(values: &[f64]) -> f64 {
    match (stats::linear_slope(values), stats::mean(values)) {
        (Some(slope), Some(mean)) if mean > 0.0 => slope / mean,
        _ => 0.0,
    }
}

/// Retention: `mean(last 5) / max`
fn compute_audience_retention_score(values: &[f64]) -> f64 {
    if values.len() < RETENTION_WINDOW {
        return 0.0;
    }
    let recent = stats::mean(&values[values.len() - RETENTION_WINDOW..]).unwrap_or(0.0);
    match stats::max(values) {
        Some(peak) if peak > 0.0 => recent / peak,
        _ => 0.0,
    }
}
