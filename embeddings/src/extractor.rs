//! Embedding extractors.
//!
//! The speaker-recognition model runs outside this process. Extractors adapt
//! it to [`EmbeddingExtractor`]; pipelines only ever see the trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::audio::AudioClip;
use crate::error::{ExtractionError, Result};
use crate::{DEFAULT_DIMENSION, Embedding};

/// Output of a successful extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEmbedding {
    /// Duration of the source audio in seconds.
    pub duration_seconds: f64,

    /// The speaker embedding.
    pub embedding: Embedding,
}

impl ExtractedEmbedding {
    /// Dimension of the embedding.
    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }
}

/// Trait for speaker embedding extractors.
///
/// Implementations must be safe to call concurrently; callers bound how
/// many calls are in flight.
#[async_trait]
pub trait EmbeddingExtractor: Send + Sync {
    /// Get the name of this extractor.
    fn name(&self) -> &str;

    /// Dimension of the embeddings this extractor produces.
    fn dimension(&self) -> usize;

    /// Compute the embedding of a decoded clip.
    async fn extract(&self, clip: &AudioClip) -> Result<ExtractedEmbedding>;
}

/// Extractor backed by an HTTP embedding service.
///
/// Posts `{"samples": [...], "sample_rate": n}` to `{base_url}/embed` and
/// expects `{"embedding": [...]}` back.
pub struct HttpExtractor {
    /// Service base URL.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Expected embedding dimension.
    dimension: usize,

    /// Name reported in logs.
    name: String,
}

impl HttpExtractor {
    /// Create a new HTTP extractor.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            dimension: DEFAULT_DIMENSION,
            name: "http".to_string(),
        }
    }

    /// Set the expected embedding dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Set the name reported in logs.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Use a preconfigured HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    samples: &'a [f32],
    sample_rate: u32,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Embedding,
}

#[async_trait]
impl EmbeddingExtractor for HttpExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn extract(&self, clip: &AudioClip) -> Result<ExtractedEmbedding> {
        clip.ensure_audible()?;

        debug!(
            "Requesting embedding for {:.2}s clip from {}",
            clip.duration_seconds(),
            self.base_url
        );

        let response = self
            .client
            .post(format!("{}/embed", self.base_url))
            .json(&EmbedRequest {
                samples: &clip.samples,
                sample_rate: clip.sample_rate,
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Request(format!("{status}: {error_text}")));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Model(format!("{status}: {error_text}")));
        }

        let body: EmbedResponse = response.json().await?;
        if body.embedding.is_empty() {
            return Err(ExtractionError::InvalidResponse(
                "empty embedding".to_string(),
            ));
        }

        info!(
            "Extracted {}-dimensional embedding via {}",
            body.embedding.len(),
            self.name
        );

        Ok(ExtractedEmbedding {
            duration_seconds: clip.duration_seconds(),
            embedding: body.embedding,
        })
    }
}
