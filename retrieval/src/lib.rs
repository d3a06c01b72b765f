//! # Voicematch Retrieval
//!
//! Ingestion and query pipelines over an embedding extractor and an
//! embedding store.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                        VoiceMatch                         │
//! ├───────────────────────────────────────────────────────────┤
//! │                                                           │
//! │  ingest_directory                    find_matches         │
//! │        │                                  │               │
//! │        ▼                                  ▼               │
//! │  ┌──────────────┐                  ┌──────────────┐       │
//! │  │  Ingestion   │                  │    Query     │       │
//! │  │   Pipeline   │                  │   Pipeline   │       │
//! │  └──────────────┘                  └──────────────┘       │
//! │     │       │                         │       │           │
//! │     │       └──────────┐  ┌───────────┘       │           │
//! │     ▼                  ▼  ▼                   ▼           │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐     │
//! │  │  Embedding   │  │  Embedding   │  │  Similarity  │     │
//! │  │    Store     │  │  Extractor   │  │    top_k     │     │
//! │  └──────────────┘  └──────────────┘  └──────────────┘     │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use voicematch_retrieval::{RetrievalConfig, VoiceMatch};
//!
//! let engine = VoiceMatch::new(RetrievalConfig::load("voicematch.toml")?).await?;
//!
//! let summary = engine.ingest_directory("samples/").await?;
//! let response = engine.find_matches(&std::fs::read("query.wav")?, Some(3)).await?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod query;
pub mod source;

pub use config::{ExtractorConfig, IngestConfig, QueryConfig, RetrievalConfig};
pub use engine::{EngineStats, VoiceMatch, VoiceMatchBuilder};
pub use error::{Result, RetrievalError};
pub use ingest::{FailureKind, IngestFailure, IngestSummary, IngestionPipeline, ItemState};
pub use query::{QueryPipeline, QueryResponse, QueryState};
pub use source::{AudioItem, list_audio_files};

// Re-export from dependencies for convenience
pub use voicematch_embeddings::{
    AudioClip, EmbeddingExtractor, ExtractedEmbedding, ExtractionError, HttpExtractor,
    MatchResult,
};
pub use voicematch_store::{EmbeddingStore, StoreConfig, StoreError, VoiceSampleRecord};
