//! The voicematch engine.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;
use voicematch_embeddings::{EmbeddingExtractor, HttpExtractor};
use voicematch_store::{EmbeddingStore, open_store};

use crate::config::RetrievalConfig;
use crate::error::{Result, RetrievalError};
use crate::ingest::{IngestSummary, IngestionPipeline};
use crate::query::{QueryPipeline, QueryResponse};

/// Entry point for ingesting and matching voice samples.
///
/// Owns one extractor and one store and shares them between the ingestion
/// and query pipelines.
pub struct VoiceMatch {
    /// Configuration.
    config: RetrievalConfig,

    /// Embedding store.
    store: Arc<dyn EmbeddingStore>,

    /// Embedding extractor.
    extractor: Arc<dyn EmbeddingExtractor>,

    /// Write path.
    ingestion: IngestionPipeline,

    /// Read path.
    query: QueryPipeline,
}

impl VoiceMatch {
    /// Create a new engine builder.
    pub fn builder() -> VoiceMatchBuilder {
        VoiceMatchBuilder::new()
    }

    /// Open the configured store and extractor.
    pub async fn new(config: RetrievalConfig) -> Result<Self> {
        Self::builder().with_config(config).build().await
    }

    /// Rank stored samples against WAV-encoded `audio`.
    ///
    /// `k` defaults to the configured `query.default_k`.
    pub async fn find_matches(&self, audio: &[u8], k: Option<usize>) -> Result<QueryResponse> {
        let k = k.unwrap_or(self.config.query.default_k);
        self.query.find_matches(audio, k).await
    }

    /// Rank stored samples against a query embedding.
    pub async fn find_matches_for_embedding(
        &self,
        embedding: &[f32],
        k: Option<usize>,
    ) -> Result<QueryResponse> {
        let k = k.unwrap_or(self.config.query.default_k);
        self.query.find_matches_for_embedding(embedding, k).await
    }

    /// Ingest every audio file in `dir`.
    pub async fn ingest_directory(&self, dir: impl AsRef<Path>) -> Result<IngestSummary> {
        self.ingestion.ingest_directory(dir.as_ref()).await
    }

    /// Ingest every audio file in `dir` until `cancel` fires.
    pub async fn ingest_directory_with_cancel(
        &self,
        dir: impl AsRef<Path>,
        cancel: CancellationToken,
    ) -> Result<IngestSummary> {
        self.ingestion
            .ingest_directory_with_cancel(dir.as_ref(), cancel)
            .await
    }

    /// Get engine statistics.
    pub async fn stats(&self) -> Result<EngineStats> {
        let records = self.store.scan().await?;
        let dimension = self.store.dimension();
        let legacy_records = records
            .iter()
            .filter(|r| r.dimension() != dimension)
            .count();

        Ok(EngineStats {
            records: records.len(),
            legacy_records,
            dimension,
            store: self.store.name().to_string(),
            extractor: self.extractor.name().to_string(),
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }
}

/// Builder for [`VoiceMatch`].
///
/// Components not supplied explicitly are created from the configuration.
pub struct VoiceMatchBuilder {
    config: RetrievalConfig,
    extractor: Option<Arc<dyn EmbeddingExtractor>>,
    store: Option<Arc<dyn EmbeddingStore>>,
}

impl VoiceMatchBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: RetrievalConfig::default(),
            extractor: None,
            store: None,
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: RetrievalConfig) -> Self {
        self.config = config;
        self
    }

    /// Use this extractor instead of the configured HTTP service.
    pub fn with_extractor(mut self, extractor: Arc<dyn EmbeddingExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Use this store instead of opening the configured one.
    pub fn with_store(mut self, store: Arc<dyn EmbeddingStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Build the engine.
    pub async fn build(self) -> Result<VoiceMatch> {
        let config = self.config;
        config.validate()?;
        let dimension = config.dimension();

        let extractor = match self.extractor {
            Some(extractor) => extractor,
            None => {
                let mut http =
                    HttpExtractor::new(&config.extractor.base_url).with_dimension(dimension);
                if let Some(name) = &config.extractor.name {
                    http = http.with_name(name);
                }
                Arc::new(http)
            }
        };
        let store = match self.store {
            Some(store) => store,
            None => open_store(&config.store, dimension).await?,
        };

        if extractor.dimension() != dimension || store.dimension() != dimension {
            return Err(RetrievalError::Config(format!(
                "dimension disagreement: config {dimension}, extractor {} {}, store {} {}",
                extractor.name(),
                extractor.dimension(),
                store.name(),
                store.dimension()
            )));
        }

        info!(
            "Voicematch ready: extractor {}, store {}, dimension {dimension}",
            extractor.name(),
            store.name()
        );

        Ok(VoiceMatch {
            ingestion: IngestionPipeline::new(
                Arc::clone(&extractor),
                Arc::clone(&store),
                config.ingest.clone(),
            ),
            query: QueryPipeline::new(
                Arc::clone(&extractor),
                Arc::clone(&store),
                config.query.clone(),
            ),
            config,
            store,
            extractor,
        })
    }
}

impl Default for VoiceMatchBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Number of stored records.
    pub records: usize,

    /// Stored records whose dimension differs from the current one.
    pub legacy_records: usize,

    /// Current embedding dimension.
    pub dimension: usize,

    /// Store backend name.
    pub store: String,

    /// Extractor name.
    pub extractor: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use voicematch_store::{MemoryStore, StoreConfig, VoiceSampleRecord};

    #[tokio::test]
    async fn test_build_from_config() {
        let config = RetrievalConfig::new().with_store(StoreConfig::Memory);
        let engine = VoiceMatch::new(config).await.unwrap();

        let stats = engine.stats().await.unwrap();
        assert_eq!(stats.records, 0);
        assert_eq!(stats.dimension, 192);
        assert_eq!(stats.store, "memory");
    }

    #[tokio::test]
    async fn test_builder_rejects_dimension_disagreement() {
        let result = VoiceMatch::builder()
            .with_config(RetrievalConfig::new().with_dimension(4))
            .with_store(Arc::new(MemoryStore::new(8)))
            .with_extractor(Arc::new(HttpExtractor::new("http://127.0.0.1:1").with_dimension(4)))
            .build()
            .await;
        assert!(matches!(result, Err(RetrievalError::Config(_))));
    }

    #[tokio::test]
    async fn test_stats_counts_legacy_records() {
        let store = MemoryStore::new(2)
            .with_legacy_records(vec![VoiceSampleRecord::new("old.wav", 2.0, vec![0.1; 3])])
            .await;
        store
            .insert(VoiceSampleRecord::new("new.wav", 1.0, vec![1.0, 0.0]))
            .await
            .unwrap();

        let engine = VoiceMatch::builder()
            .with_config(RetrievalConfig::new().with_dimension(2))
            .with_store(Arc::new(store))
            .with_extractor(Arc::new(HttpExtractor::new("http://127.0.0.1:1").with_dimension(2)))
            .build()
            .await
            .unwrap();

        let stats = engine.stats().await.unwrap();
        assert_eq!(stats.records, 2);
        assert_eq!(stats.legacy_records, 1);
    }
}
