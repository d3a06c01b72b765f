//! # Embeddings
//!
//! Speaker embeddings and similarity ranking for voicematch.
//!
//! ## Features
//!
//! - **Extraction**: Turn decoded audio into a fixed-dimension embedding
//!   through an [`EmbeddingExtractor`]
//! - **Audio Decoding**: WAV files and byte buffers into mono [`AudioClip`]s
//! - **Similarity Search**: Cosine similarity and deterministic top-k ranking
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  WAV bytes ──► AudioClip ──► EmbeddingExtractor ──► Embedding  │
//! │                                                       │         │
//! │                                                       ▼         │
//! │                         Candidates ──► top_k ──► RankedMatches  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod error;
pub mod extractor;
pub mod similarity;

pub use audio::{AudioClip, decode_wav_bytes, decode_wav_file};
pub use error::{ExtractionError, SimilarityError};
pub use extractor::{EmbeddingExtractor, ExtractedEmbedding, HttpExtractor};
pub use similarity::{Candidate, MatchResult, RankedMatches, cosine_similarity, top_k};

/// A dense speaker embedding.
pub type Embedding = Vec<f32>;

/// Dimension of ECAPA-TDNN speaker embeddings (speechbrain voxceleb model).
pub const DEFAULT_DIMENSION: usize = 192;
