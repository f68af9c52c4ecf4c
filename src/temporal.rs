//! Temporal feature extraction
//!
//! Parses event timestamps and derives calendar attributes (hour, weekday,
//! month, weekend flag, quarter). Attributes are read in the offset the
//! timestamp was stamped with, so a post at 14:00+05:30 has hour 14.

use crate::error::ComputeError;
use crate::types::TemporalFeatures;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, Timelike};

/// Naive date-time layouts accepted after RFC 3339 fails (interpreted as UTC)
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a timestamp string
///
/// Accepts RFC 3339, naive ISO date-times (`T` or space separator, optional
/// fractional seconds) and bare dates. Naive values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>, ComputeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ComputeError::TimestampParse("empty timestamp".to_string()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt);
    }

    let utc = FixedOffset::east_opt(0)
        .ok_or_else(|| ComputeError::TimestampParse("invalid UTC offset".to_string()))?;

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc().with_timezone(&utc));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc().with_timezone(&utc));
        }
    }

    Err(ComputeError::TimestampParse(format!(
        "unrecognized timestamp '{trimmed}'"
    )))
}

impl TemporalFeatures {
    /// Derive calendar attributes from a parsed timestamp
    pub fn from_timestamp(timestamp: &DateTime<FixedOffset>) -> Self {
        let day_of_week = timestamp.weekday().num_days_from_monday();
        let month = timestamp.month();
        Self {
            hour: timestamp.hour(),
            day_of_week,
            month,
            is_weekend: day_of_week >= 5,
            quarter: (month - 1) / 3 + 1,
        }
    }

    /// Attribute values as numbers, in a fixed order, for correlation analysis
    pub fn as_vector(&self) -> [f64; 5] {
        [
            self.hour as f64,
            self.day_of_week as f64,
            self.month as f64,
            if self.is_weekend { 1.0 } else { 0.0 },
            self.quarter as f64,
        ]
    }
}

/// Parse a raw timestamp and derive its temporal features
pub fn extract_temporal_features(raw: &str) -> Result<TemporalFeatures, ComputeError> {
    let timestamp = parse_timestamp(raw)?;
    Ok(TemporalFeatures::from_timestamp(&timestamp))
}

/// Temporal features for an already-parsed event sequence
pub fn features_for(timestamps: &[DateTime<FixedOffset>]) -> Vec<TemporalFeatures> {
    timestamps.iter().map(TemporalFeatures::from_timestamp).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weekday_features() {
        // 2024-01-15 is a Monday
        let features = extract_temporal_features("2024-01-15T14:30:00Z").unwrap();
        assert_eq!(
            features,
            TemporalFeatures {
                hour: 14,
                day_of_week: 0,
                month: 1,
                is_weekend: false,
                quarter: 1,
            }
        );
    }

    #[test]
    fn test_weekend_and_quarter() {
        // 2024-08-17 is a Saturday
        let features = extract_temporal_features("2024-08-17 09:05:00").unwrap();
        assert_eq!(features.day_of_week, 5);
        assert!(features.is_weekend);
        assert_eq!(features.quarter, 3);
        assert_eq!(features.month, 8);

        let december = extract_temporal_features("2024-12-01").unwrap();
        assert_eq!(december.quarter, 4);
        assert_eq!(december.hour, 0);
        assert!(december.is_weekend); // Sunday
    }

    #[test]
    fn test_offset_is_preserved() {
        let features = extract_temporal_features("2024-01-15T23:30:00+05:30").unwrap();
        assert_eq!(features.hour, 23);
        assert_eq!(features.day_of_week, 0);

        let parsed = parse_timestamp("2024-01-15T23:30:00+05:30").unwrap();
        assert_eq!(
            parsed.with_timezone(&chrono::Utc).to_rfc3339(),
            "2024-01-15T18:00:00+00:00"
        );
    }

    #[test]
    fn test_fractional_seconds() {
        let parsed = parse_timestamp("2024-03-01T10:00:00.250").unwrap();
        assert_eq!(parsed.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_malformed_timestamp_is_an_error() {
        assert!(matches!(
            extract_temporal_features("yesterday"),
            Err(ComputeError::TimestampParse(_))
        ));
        assert!(matches!(
            parse_timestamp("   "),
            Err(ComputeError::TimestampParse(_))
        ));
        assert!(parse_timestamp("2024-13-45T00:00:00Z").is_err());
    }

    #[test]
    fn test_as_vector_order() {
        let features = extract_temporal_features("2024-06-08T18:00:00Z").unwrap();
        assert_eq!(features.as_vector(), [18.0, 5.0, 6.0, 1.0, 2.0]);
    }
}
