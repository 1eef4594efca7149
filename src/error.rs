//! Error types for the perfscore pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PerfError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum PerfError {
    /// Feature alignment against the schema is impossible
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A label stratum is too small for the requested fold count
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// A hyperparameter trial errored or failed to converge
    #[error("Trial {trial} failed: {reason}")]
    TrialFailure { trial: usize, reason: String },

    /// A persisted schema/model pair is incompatible
    #[error("Artifact version mismatch: expected {expected}, found {found}")]
    ArtifactVersionMismatch { expected: String, found: String },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Convergence failed after {iterations} iterations: {reason}")]
    ConvergenceError { iterations: usize, reason: String },

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,
}

impl PerfError {
    /// Shorthand for a parameter validation failure
    pub fn invalid_parameter(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        PerfError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<polars::error::PolarsError> for PerfError {
    fn from(err: polars::error::PolarsError) -> Self {
        PerfError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for PerfError {
    fn from(err: serde_json::Error) -> Self {
        PerfError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PerfError {
    fn from(err: ndarray::ShapeError) -> Self {
        PerfError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<tempfile::PersistError> for PerfError {
    fn from(err: tempfile::PersistError) -> Self {
        PerfError::IoError(err.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PerfError::SchemaMismatch("column `age` is not numeric".to_string());
        assert_eq!(err.to_string(), "Schema mismatch: column `age` is not numeric");

        let err = PerfError::TrialFailure { trial: 3, reason: "diverged".to_string() };
        assert_eq!(err.to_string(), "Trial 3 failed: diverged");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PerfError = io_err.into();
        assert!(matches!(err, PerfError::IoError(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: PerfError = json_err.into();
        assert!(matches!(err, PerfError::SerializationError(_)));
    }
}
