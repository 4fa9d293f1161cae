//! Error types for ragbench
//!
//! One error enum for the whole pipeline. Variants group into configuration,
//! provider, data and resource failures; `is_fatal` tells the runner whether
//! a failure aborts the run or is isolated to the current query.

use thiserror::Error;

/// Main error type for the experiment pipeline
#[derive(Error, Debug)]
pub enum BenchError {
    /// State machine transition errors
    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    /// Configuration errors (invalid parameters, missing secrets)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A collaborator required by the selected configuration was not supplied
    #[error("Required collaborator not configured: {0}")]
    NotConfigured(String),

    /// Embedding provider failures
    #[error("Embedding provider error: {0}")]
    EmbeddingError(String),

    /// Relevance scorer failures
    #[error("Rerank provider error: {0}")]
    RerankError(String),

    /// Answer generator failures
    #[error("Answer provider error: {0}")]
    AnswerError(String),

    /// Transient remote API failures (rate limits, 5xx)
    #[error("Remote API error: {0}")]
    ApiError(String),

    /// Provider returned a body that could not be interpreted
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    /// Malformed records, dimension mismatches, id collisions
    #[error("Data error: {0}")]
    DataError(String),

    /// Vector index unavailable or failing
    #[error("Vector index error: {0}")]
    IndexError(String),

    /// Retry budget spent
    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    /// Timeout errors
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{0}")]
    Generic(String),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, BenchError>;

impl BenchError {
    /// Whether this failure must stop the whole run.
    ///
    /// Provider and data failures are recorded against the query that hit
    /// them; configuration and resource failures are not.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BenchError::ConfigError(_)
                | BenchError::NotConfigured(_)
                | BenchError::IndexError(_)
                | BenchError::IoError(_)
                | BenchError::InvalidTransition { .. }
        )
    }
}

/// Convert anyhow errors to BenchError
impl From<anyhow::Error> for BenchError {
    fn from(err: anyhow::Error) -> Self {
        BenchError::Generic(format!("{:#}", err))
    }
}
