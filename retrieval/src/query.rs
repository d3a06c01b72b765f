//! Single-sample similarity queries.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use voicematch_embeddings::{
    AudioClip, EmbeddingExtractor, ExtractionError, MatchResult, SimilarityError,
    decode_wav_bytes, top_k,
};
use voicematch_store::EmbeddingStore;

use crate::config::QueryConfig;
use crate::error::{Result, RetrievalError};

/// Lifecycle of one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Received,
    Extracted,
    Retrieved,
    Ranked,
    Returned,
    Failed,
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Received => "received",
            Self::Extracted => "extracted",
            Self::Retrieved => "retrieved",
            Self::Ranked => "ranked",
            Self::Returned => "returned",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Ranked answer to a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Matches, best first.
    pub results: Vec<MatchResult>,

    /// Stored records skipped because their dimension differs from the query.
    pub skipped_mismatches: usize,

    /// Stored records skipped because their embedding is degenerate.
    pub skipped_degenerate: usize,
}

/// Finds the stored samples most similar to a query sample.
pub struct QueryPipeline {
    extractor: Arc<dyn EmbeddingExtractor>,
    store: Arc<dyn EmbeddingStore>,
    config: QueryConfig,
}

impl QueryPipeline {
    /// Create a pipeline over the given collaborators.
    pub fn new(
        extractor: Arc<dyn EmbeddingExtractor>,
        store: Arc<dyn EmbeddingStore>,
        config: QueryConfig,
    ) -> Self {
        Self {
            extractor,
            store,
            config,
        }
    }

    /// Rank stored samples against WAV-encoded `audio`.
    pub async fn find_matches(&self, audio: &[u8], k: usize) -> Result<QueryResponse> {
        debug!("query {} ({} bytes)", QueryState::Received, audio.len());
        if audio.len() > self.config.max_audio_bytes {
            return Err(failed(RetrievalError::Extraction(
                ExtractionError::TooLarge {
                    size: audio.len(),
                    max_size: self.config.max_audio_bytes,
                },
            )));
        }
        let bytes = audio.to_vec();
        let clip = tokio::task::spawn_blocking(move || decode_wav_bytes(&bytes))
            .await
            .map_err(|e| {
                failed(RetrievalError::Extraction(ExtractionError::Decode(format!(
                    "decode task failed: {e}"
                ))))
            })?
            .map_err(|e| failed(e.into()))?;
        self.find_matches_for_clip(&clip, k).await
    }

    /// Rank stored samples against already-decoded audio.
    pub async fn find_matches_for_clip(&self, clip: &AudioClip, k: usize) -> Result<QueryResponse> {
        let timeout = self.config.timeout();
        let extracted = match tokio::time::timeout(timeout, self.extractor.extract(clip)).await {
            Ok(Ok(extracted)) => extracted,
            Ok(Err(e)) => return Err(failed(e.into())),
            Err(_) => return Err(failed(RetrievalError::ExtractionTimeout { timeout })),
        };
        debug!("query {}", QueryState::Extracted);

        self.find_matches_for_embedding(&extracted.embedding, k)
            .await
    }

    /// Rank stored samples against a query embedding.
    pub async fn find_matches_for_embedding(
        &self,
        embedding: &[f32],
        k: usize,
    ) -> Result<QueryResponse> {
        let start = Instant::now();
        let expected = self.store.dimension();
        if embedding.len() != expected {
            return Err(failed(RetrievalError::QueryDimensionMismatch {
                expected,
                actual: embedding.len(),
            }));
        }

        let records = self.store.scan().await.map_err(|e| failed(e.into()))?;
        debug!("query {} ({} records)", QueryState::Retrieved, records.len());

        let ranked = top_k(embedding, &records, k).map_err(|e| {
            failed(match e {
                SimilarityError::DegenerateVector => RetrievalError::DegenerateQuery,
                SimilarityError::DimensionMismatch { expected, actual } => {
                    RetrievalError::QueryDimensionMismatch { expected, actual }
                }
            })
        })?;
        debug!("query {}", QueryState::Ranked);

        if ranked.skipped() > 0 {
            warn!(
                "Skipped {} stored records ({} dimension mismatches, {} degenerate)",
                ranked.skipped(),
                ranked.skipped_mismatches,
                ranked.skipped_degenerate
            );
        }
        info!(
            "Query {}: {} matches from {} records in {}ms",
            QueryState::Returned,
            ranked.results.len(),
            records.len(),
            start.elapsed().as_millis()
        );

        Ok(QueryResponse {
            results: ranked.results,
            skipped_mismatches: ranked.skipped_mismatches,
            skipped_degenerate: ranked.skipped_degenerate,
        })
    }
}

fn failed(err: RetrievalError) -> RetrievalError {
    warn!("query {}: {err}", QueryState::Failed);
    err
}
