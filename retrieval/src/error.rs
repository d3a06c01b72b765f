//! Error types for the ingestion and query pipelines.

use std::time::Duration;

use thiserror::Error;
use voicematch_embeddings::ExtractionError;
use voicematch_store::StoreError;

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors that can occur in the retrieval pipelines.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// The audio could not be turned into an embedding.
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    /// The extractor did not answer in time.
    #[error("extraction timed out after {timeout:?}")]
    ExtractionTimeout { timeout: Duration },

    /// The query embedding does not match the store's dimension.
    #[error("query embedding has dimension {actual}, store expects {expected}")]
    QueryDimensionMismatch { expected: usize, actual: usize },

    /// The query embedding has zero norm or non-finite values.
    #[error("query embedding is degenerate")]
    DegenerateQuery,

    /// Store error.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// The audio source could not be listed.
    #[error("audio source error: {0}")]
    Source(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl RetrievalError {
    /// Whether the failure is infrastructure-related and worth retrying.
    ///
    /// Everything else means the input itself is unusable.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ExtractionTimeout { .. } => true,
            Self::Extraction(e) => e.is_transient(),
            Self::Storage(e) => e.is_transient(),
            _ => false,
        }
    }
}
