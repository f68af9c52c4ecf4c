//! Error types for Engagement Flux

use thiserror::Error;

/// Errors that can occur during computation
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to parse cohort payload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Timestamp parse error: {0}")]
    TimestampParse(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Cohort is empty: {0}")]
    CohortEmpty(String),

    #[error("Prediction error: {0}")]
    Prediction(String),
}

impl ComputeError {
    /// Stable machine-readable code for this error kind
    pub fn code(&self) -> &'static str {
        match self {
            ComputeError::ParseError(_) => "parse_error",
            ComputeError::JsonError(_) => "json_error",
            ComputeError::MalformedInput(_)
            | ComputeError::MissingField(_)
            | ComputeError::TimestampParse(_) => "malformed_input",
            ComputeError::ConfigurationError(_) => "configuration_error",
            ComputeError::CohortEmpty(_) => "cohort_empty",
            ComputeError::Prediction(_) => "prediction_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_level_errors_share_malformed_code() {
        assert_eq!(ComputeError::MissingField("timestamp".into()).code(), "malformed_input");
        assert_eq!(ComputeError::TimestampParse("x".into()).code(), "malformed_input");
        assert_eq!(ComputeError::MalformedInput("x".into()).code(), "malformed_input");
        assert_eq!(ComputeError::CohortEmpty("x".into()).code(), "cohort_empty");
    }

    #[test]
    fn test_display_includes_detail() {
        let err = ComputeError::ConfigurationError("missing momentum_score".into());
        assert_eq!(err.to_string(), "Configuration error: missing momentum_score");
    }
}
