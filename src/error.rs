//! Error types for the highlight store

use thiserror::Error;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, HighlightError>;

/// Highlight store error type
///
/// Callers can branch on the failure cause instead of receiving a collapsed
/// boolean: `NotFound`, `DuplicateExists` and `InvalidArgument` describe
/// expected outcomes of store operations, the remaining variants are storage
/// failures.
#[derive(Error, Debug)]
pub enum HighlightError {
    #[error("Highlight not found")]
    NotFound,

    #[error("An identical highlight already exists")]
    DuplicateExists,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),
}

impl HighlightError {
    /// True when the error is an expected miss rather than a storage failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, HighlightError::NotFound)
    }

    /// True for I/O, query, or decoding failures
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            HighlightError::Database(_)
                | HighlightError::Serialization(_)
                | HighlightError::Timestamp(_)
        )
    }
}
