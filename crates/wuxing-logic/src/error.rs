//! Error types for chart parsing, configuration, and the calendar boundary.

use thiserror::Error;

use crate::chart::Pillar;
use crate::config::ConfigError;

/// A natal pillar string that could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChartError {
    #[error("{pillar} pillar: expected a stem and a branch, got {input:?}")]
    Malformed { pillar: Pillar, input: String },

    #[error("{pillar} pillar: unknown stem '{found}'")]
    UnknownStem { pillar: Pillar, found: char },

    #[error("{pillar} pillar: unknown branch '{found}'")]
    UnknownBranch { pillar: Pillar, found: char },
}

/// A sexagenary term string that is not one of the 60 terms.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TermError {
    #[error("unknown sexagenary term {0:?}")]
    Unknown(String),

    #[error("stem and branch of {0:?} differ in parity")]
    ParityMismatch(String),
}

/// Failure reported by a [`CalendarService`](crate::calendar::CalendarService).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("date out of calendar range: {0}")]
    OutOfRange(String),

    #[error("calendar returned an unusable term: {0}")]
    Term(#[from] TermError),

    #[error("calendar lookup failed: {0}")]
    Lookup(String),
}

/// Top-level engine error.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Chart error: {0}")]
    Chart(#[from] ChartError),

    #[error("Invalid configuration: {}", join_config_errors(.0))]
    Config(Vec<ConfigError>),

    #[error("Calendar error: {0}")]
    Calendar(#[from] CalendarError),

    #[error("Term error: {0}")]
    Term(#[from] TermError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<Vec<ConfigError>> for EngineError {
    fn from(errors: Vec<ConfigError>) -> Self {
        EngineError::Config(errors)
    }
}

fn join_config_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_error_names_pillar() {
        let err = ChartError::UnknownBranch {
            pillar: Pillar::Month,
            found: 'x',
        };
        assert_eq!(err.to_string(), "month pillar: unknown branch 'x'");
    }

    #[test]
    fn test_config_errors_are_joined() {
        let err = EngineError::from(vec![
            ConfigError {
                field: "minEnergy".into(),
                message: "must be positive".into(),
            },
            ConfigError {
                field: "weakThreshold".into(),
                message: "must exceed veryWeakThreshold".into(),
            },
        ]);
        let text = err.to_string();
        assert!(text.starts_with("Invalid configuration: "));
        assert!(text.contains("minEnergy: must be positive"));
        assert!(text.contains("; weakThreshold"));
    }
}
