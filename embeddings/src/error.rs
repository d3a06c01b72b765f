//! Error types for extraction and similarity.

use thiserror::Error;

/// Result type for this crate; extraction errors unless stated otherwise.
pub type Result<T, E = ExtractionError> = std::result::Result<T, E>;

/// Errors produced while turning audio into an embedding.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// Audio could not be decoded (corrupted or truncated data).
    #[error("failed to decode audio: {0}")]
    Decode(String),

    /// Audio encoding is not supported.
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Audio contains no samples.
    #[error("audio contains no samples")]
    EmptyAudio,

    /// Audio contains only silence.
    #[error("audio is silent")]
    Silence,

    /// Audio payload exceeds the configured limit.
    #[error("audio too large: {size} bytes, max {max_size}")]
    TooLarge { size: usize, max_size: usize },

    /// The model rejected the input or failed internally.
    #[error("model error: {0}")]
    Model(String),

    /// The extractor could not be reached.
    #[error("extractor request failed: {0}")]
    Request(String),

    /// The extractor answered with something unusable.
    #[error("invalid extractor response: {0}")]
    InvalidResponse(String),
}

impl ExtractionError {
    /// Whether retrying the same input may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Request(_))
    }
}

impl From<hound::Error> for ExtractionError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::Unsupported => Self::UnsupportedFormat("unsupported wav encoding".to_string()),
            hound::Error::FormatError(msg) => Self::Decode(msg.to_string()),
            hound::Error::IoError(e) => Self::Decode(e.to_string()),
            other => Self::Decode(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for ExtractionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// Errors produced by the similarity engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimilarityError {
    /// Vectors of different length were compared.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A vector has zero norm or non-finite components.
    #[error("degenerate vector: zero norm or non-finite values")]
    DegenerateVector,
}
