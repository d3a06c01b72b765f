//! Error types for the embedding store.

use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in the embedding store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A record with this identifier already exists.
    #[error("duplicate identifier: {0}")]
    DuplicateIdentifier(String),

    /// Record embedding does not match the store's dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Record failed validation.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// The persistence layer failed.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Embedding (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether the failure comes from infrastructure rather than the data.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::StorageUnavailable(format!("sqlite: {err}"))
    }
}
