//! Error types for gamidash-core

use thiserror::Error;

/// Main error type for the gamidash-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A query was issued against a table the operation cannot read
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The store cannot be reached at all. Fatal for a whole request.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A single aggregate query exceeded its time budget
    #[error("aggregate {aggregate} timed out after {timeout_ms}ms")]
    Timeout {
        aggregate: &'static str,
        timeout_ms: u64,
    },

    /// A blocking aggregate task panicked or was cancelled
    #[error("aggregate task failed: {0}")]
    Task(String),
}

impl Error {
    /// Whether this error should abort the whole request rather than degrade one field.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::StoreUnavailable(_))
    }
}

/// Result type alias for gamidash-core
pub type Result<T> = std::result::Result<T, Error>;
