//! Sentiment classification
//!
//! Maps a composite score to one of five ordered categories, either by
//! comparing the raw score to fixed cut points or by comparing its percentile
//! rank within the current cohort.

use crate::error::ComputeError;
use crate::types::Sentiment;
use serde::{Deserialize, Serialize};

/// Four strictly descending cut points separating the five categories
///
/// A value `>= extreme_positive` is ExtremePositive, `>= positive` is
/// Positive, and so on; anything below `negative` is ExtremeNegative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CutPoints {
    pub extreme_positive: f64,
    pub positive: f64,
    pub neutral: f64,
    pub negative: f64,
}

impl CutPoints {
    /// Default cut points on the raw composite score
    pub const ABSOLUTE: CutPoints = CutPoints {
        extreme_positive: 0.8,
        positive: 0.6,
        neutral: 0.4,
        negative: 0.2,
    };

    /// Default cut points on the cohort percentile (0-100)
    pub const PERCENTILE: CutPoints = CutPoints {
        extreme_positive: 95.0,
        positive: 80.0,
        neutral: 60.0,
        negative: 40.0,
    };

    pub fn validate(&self) -> Result<(), ComputeError> {
        let points = [
            self.extreme_positive,
            self.positive,
            self.neutral,
            self.negative,
        ];
        if points.iter().any(|p| !p.is_finite()) {
            return Err(ComputeError::ConfigurationError(
                "cut points must be finite".to_string(),
            ));
        }
        if points.windows(2).any(|pair| pair[0] <= pair[1]) {
            return Err(ComputeError::ConfigurationError(format!(
                "cut points must be strictly descending, got {points:?}"
            )));
        }
        Ok(())
    }

    pub fn categorize(&self, value: f64) -> Sentiment {
        if value >= self.extreme_positive {
            Sentiment::ExtremePositive
        } else if value >= self.positive {
            Sentiment::Positive
        } else if value >= self.neutral {
            Sentiment::Neutral
        } else if value >= self.negative {
            Sentiment::Negative
        } else {
            Sentiment::ExtremeNegative
        }
    }
}

/// Classification policy with its cut points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassificationPolicy {
    /// Raw composite score against fixed thresholds
    Absolute {
        #[serde(default = "absolute_cut_points")]
        cut_points: CutPoints,
    },
    /// Percentile rank within the current cohort
    Percentile {
        #[serde(default = "percentile_cut_points")]
        cut_points: CutPoints,
    },
}

fn absolute_cut_points() -> CutPoints {
    CutPoints::ABSOLUTE
}

fn percentile_cut_points() -> CutPoints {
    CutPoints::PERCENTILE
}

impl ClassificationPolicy {
    pub fn absolute() -> Self {
        ClassificationPolicy::Absolute {
            cut_points: CutPoints::ABSOLUTE,
        }
    }

    pub fn percentile() -> Self {
        ClassificationPolicy::Percentile {
            cut_points: CutPoints::PERCENTILE,
        }
    }

    /// Policy from its name (`absolute` / `percentile`) with default cut points
    pub fn from_name(name: &str) -> Result<Self, ComputeError> {
        match name {
            "absolute" => Ok(Self::absolute()),
            "percentile" => Ok(Self::percentile()),
            other => Err(ComputeError::ConfigurationError(format!(
                "unknown classification policy '{other}'"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationPolicy::Absolute { .. } => "absolute",
            ClassificationPolicy::Percentile { .. } => "percentile",
        }
    }

    pub fn cut_points(&self) -> &CutPoints {
        match self {
            ClassificationPolicy::Absolute { cut_points }
            | ClassificationPolicy::Percentile { cut_points } => cut_points,
        }
    }

    pub fn validate(&self) -> Result<(), ComputeError> {
        self.cut_points().validate()
    }

    /// Classify every score of a cohort, preserving order
    ///
    /// The percentile policy ranks each score against a snapshot of the whole
    /// slice, so the slice must be the complete cohort.
    pub fn classify_cohort(&self, scores: &[f64]) -> Result<Vec<Sentiment>, ComputeError> {
        self.validate()?;
        match self {
            ClassificationPolicy::Absolute { cut_points } => {
                let classifier = AbsoluteThresholdClassifier::new(*cut_points)?;
                Ok(scores.iter().map(|s| classifier.classify(*s)).collect())
            }
            ClassificationPolicy::Percentile { cut_points } => {
                let classifier = PercentileRankClassifier::from_cohort(scores, *cut_points)?;
                Ok(scores.iter().map(|s| classifier.classify(*s)).collect())
            }
        }
    }
}

impl Default for ClassificationPolicy {
    fn default() -> Self {
        Self::absolute()
    }
}

/// Human-readable names for the five categories
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelSet {
    /// Extreme Bullish .. Extreme Bearish
    #[default]
    Market,
    /// Extreme Greed .. Extreme Fear
    Emotion,
}

impl LabelSet {
    pub fn label(&self, sentiment: Sentiment) -> &'static str {
        match (self, sentiment) {
            (LabelSet::Market, Sentiment::ExtremePositive) => "Extreme Bullish",
            (LabelSet::Market, Sentiment::Positive) => "Bullish",
            (LabelSet::Market, Sentiment::Neutral) => "Neutral",
            (LabelSet::Market, Sentiment::Negative) => "Bearish",
            (LabelSet::Market, Sentiment::ExtremeNegative) => "Extreme Bearish",
            (LabelSet::Emotion, Sentiment::ExtremePositive) => "Extreme Greed",
            (LabelSet::Emotion, Sentiment::Positive) => "Greed",
            (LabelSet::Emotion, Sentiment::Neutral) => "Neutral",
            (LabelSet::Emotion, Sentiment::Negative) => "Fear",
            (LabelSet::Emotion, Sentiment::ExtremeNegative) => "Extreme Fear",
        }
    }
}

/// Classifies raw composite scores against fixed cut points
#[derive(Debug, Clone, Copy)]
pub struct AbsoluteThresholdClassifier {
    cut_points: CutPoints,
}

impl Default for AbsoluteThresholdClassifier {
    fn default() -> Self {
        Self {
            cut_points: CutPoints::ABSOLUTE,
        }
    }
}

impl AbsoluteThresholdClassifier {
    pub fn new(cut_points: CutPoints) -> Result<Self, ComputeError> {
        cut_points.validate()?;
        Ok(Self { cut_points })
    }

    pub fn classify(&self, score: f64) -> Sentiment {
        self.cut_points.categorize(score)
    }
}

/// Classifies scores by their percentile rank in a fixed cohort snapshot
#[derive(Debug, Clone)]
pub struct PercentileRankClassifier {
    sorted: Vec<f64>,
    cut_points: CutPoints,
}

impl PercentileRankClassifier {
    /// Snapshot a cohort of composite scores
    pub fn from_cohort(scores: &[f64], cut_points: CutPoints) -> Result<Self, ComputeError> {
        if scores.is_empty() {
            return Err(ComputeError::CohortEmpty(
                "percentile classification needs at least one scored entity".to_string(),
            ));
        }
        cut_points.validate()?;

        let mut sorted = scores.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        Ok(Self { sorted, cut_points })
    }

    /// Share of the cohort strictly below `score`, in percent
    pub fn percentile(&self, score: f64) -> f64 {
        let below = self.sorted.partition_point(|s| *s < score);
        below as f64 / self.sorted.len() as f64 * 100.0
    }

    pub fn classify(&self, score: f64) -> Sentiment {
        self.cut_points.categorize(self.percentile(score))
    }

    pub fn cohort_size(&self) -> usize {
        self.sorted.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_absolute_thresholds() {
        let classifier = AbsoluteThresholdClassifier::default();
        assert_eq!(classifier.classify(0.85), Sentiment::ExtremePositive);
        assert_eq!(classifier.classify(0.8), Sentiment::ExtremePositive);
        assert_eq!(classifier.classify(0.6), Sentiment::Positive);
        assert_eq!(classifier.classify(0.59), Sentiment::Neutral);
        assert_eq!(classifier.classify(0.2), Sentiment::Negative);
        assert_eq!(classifier.classify(0.19), Sentiment::ExtremeNegative);
        assert_eq!(classifier.classify(-3.0), Sentiment::ExtremeNegative);
    }

    #[test]
    fn test_twenty_increasing_scores() {
        let scores: Vec<f64> = (1..=20).map(|i| i as f64 / 10.0).collect();
        let classifier = PercentileRankClassifier::from_cohort(&scores, CutPoints::PERCENTILE).unwrap();
        assert_eq!(classifier.cohort_size(), 20);

        assert_eq!(classifier.percentile(2.0), 95.0);
        assert_eq!(classifier.classify(2.0), Sentiment::ExtremePositive);
        assert_eq!(classifier.percentile(0.1), 0.0);
        assert_eq!(classifier.classify(0.1), Sentiment::ExtremeNegative);
        // 16 scores below 1.7 -> 80th percentile
        assert_eq!(classifier.classify(1.7), Sentiment::Positive);
    }

    #[test]
    fn test_ties_share_a_percentile() {
        let classifier =
            PercentileRankClassifier::from_cohort(&[0.5, 0.5, 0.5, 0.9], CutPoints::PERCENTILE)
                .unwrap();
        assert_eq!(classifier.percentile(0.5), 0.0);
        assert_eq!(classifier.percentile(0.9), 75.0);
    }

    #[test]
    fn test_single_entity_cohort_is_bottom() {
        let classifier = PercentileRankClassifier::from_cohort(&[0.7], CutPoints::PERCENTILE).unwrap();
        assert_eq!(classifier.percentile(0.7), 0.0);
        assert_eq!(classifier.classify(0.7), Sentiment::ExtremeNegative);
    }

    #[test]
    fn test_empty_cohort() {
        assert!(matches!(
            PercentileRankClassifier::from_cohort(&[], CutPoints::PERCENTILE),
            Err(ComputeError::CohortEmpty(_))
        ));
        assert!(matches!(
            ClassificationPolicy::percentile().classify_cohort(&[]),
            Err(ComputeError::CohortEmpty(_))
        ));
        // Absolute classification of nothing is simply nothing
        assert!(ClassificationPolicy::absolute()
            .classify_cohort(&[])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_cut_points_must_descend() {
        let flat = CutPoints {
            extreme_positive: 0.8,
            positive: 0.8,
            neutral: 0.4,
            negative: 0.2,
        };
        assert!(matches!(
            AbsoluteThresholdClassifier::new(flat),
            Err(ComputeError::ConfigurationError(_))
        ));
        let inverted = CutPoints {
            extreme_positive: 40.0,
            positive: 60.0,
            neutral: 80.0,
            negative: 95.0,
        };
        assert!(PercentileRankClassifier::from_cohort(&[1.0], inverted).is_err());
    }

    #[test]
    fn test_classify_cohort_preserves_order() {
        let scores = [0.1, 0.9, 0.5];
        let absolute = ClassificationPolicy::absolute().classify_cohort(&scores).unwrap();
        assert_eq!(
            absolute,
            vec![
                Sentiment::ExtremeNegative,
                Sentiment::ExtremePositive,
                Sentiment::Neutral
            ]
        );

        let relative = ClassificationPolicy::percentile().classify_cohort(&scores).unwrap();
        // percentiles 0, 66.7, 33.3
        assert_eq!(
            relative,
            vec![
                Sentiment::ExtremeNegative,
                Sentiment::Neutral,
                Sentiment::ExtremeNegative
            ]
        );
    }

    #[test]
    fn test_label_sets() {
        assert_eq!(LabelSet::Market.label(Sentiment::Positive), "Bullish");
        assert_eq!(LabelSet::Emotion.label(Sentiment::ExtremeNegative), "Extreme Fear");
        assert_eq!(LabelSet::Emotion.label(Sentiment::Neutral), "Neutral");
    }

    #[test]
    fn test_policy_json() {
        let policy: ClassificationPolicy = serde_json::from_str(r#"{"kind":"percentile"}"#).unwrap();
        assert_eq!(policy, ClassificationPolicy::percentile());

        let custom: ClassificationPolicy = serde_json::from_str(
            r#"{"kind":"absolute","cut_points":{"extreme_positive":0.5,"positive":0.3,"neutral":0.1,"negative":0.0}}"#,
        )
        .unwrap();
        assert_eq!(custom.cut_points().neutral, 0.1);
        assert!(ClassificationPolicy::from_name("quantile").is_err());
    }
}
