//! Error types for cohort-density-core.
//!
//! Configuration problems are raised synchronously when a `Recipe`, policy or
//! `EngineConfig` is built. Missing precomputed inputs (unknown metric names,
//! unset reference vectors, out-of-range component indices) are NOT errors:
//! extraction resolves them to `0.0` and logs at `debug`.

use thiserror::Error;

/// Top-level error type for the density engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Engine configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A recipe failed validation at construction time.
    #[error("Invalid recipe field `{field}`: {message}")]
    InvalidRecipe { field: String, message: String },

    /// Feature vectors of one cohort (or two compared cohorts) disagree on dimensionality.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Caller supplied an input the engine cannot work with.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The worker pool could not be created.
    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    /// A single parallel task panicked or failed.
    #[error("Task `{task}` failed: {message}")]
    TaskFailed { task: String, message: String },

    /// A parallel computation was abandoned after its first task failure.
    #[error("{operation} aborted: {source}")]
    Aborted {
        operation: String,
        #[source]
        source: Box<EngineError>,
    },

    /// Serialization of an audit record or config failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl EngineError {
    /// Create an InvalidRecipe error.
    pub fn invalid_recipe(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRecipe {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Wrap a task failure into the aggregate error returned by parallel callers.
    pub fn aborted(operation: impl Into<String>, source: EngineError) -> Self {
        Self::Aborted {
            operation: operation.into(),
            source: Box::new(source),
        }
    }

    /// True for errors raised while validating configuration.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigError(_) | Self::InvalidRecipe { .. })
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
