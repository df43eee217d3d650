//! Harness error types

use splitrun_tasks::TaskError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors raised while selecting, running or reporting cases
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid test case name '{0}'")]
    InvalidCaseName(String),

    #[error("Test case '{0}' is registered twice")]
    DuplicateCase(String),

    #[error("Invalid name pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Found {0} test source file(s) but [runner] command is not configured")]
    MissingRunnerCommand(usize),

    #[error("No coverage execution data at {0} (run the 'test' task first)")]
    MissingExecutionData(PathBuf),

    #[error("Corrupt coverage execution data in {path}: {source}")]
    CorruptExecutionData {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Line coverage {actual:.1}% is below the required minimum of {minimum:.1}%")]
    CoverageBelowMinimum { actual: f64, minimum: f64 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Task(#[from] TaskError),
}

impl HarnessError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }
}
