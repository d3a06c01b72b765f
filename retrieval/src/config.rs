//! Configuration for the voicematch engine.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use voicematch_embeddings::DEFAULT_DIMENSION;
use voicematch_store::StoreConfig;

use crate::error::{Result, RetrievalError};

/// Configuration for the voicematch engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Embedding extractor configuration.
    pub extractor: ExtractorConfig,

    /// Which store to open.
    pub store: StoreConfig,

    /// Ingestion configuration.
    pub ingest: IngestConfig,

    /// Query configuration.
    pub query: QueryConfig,
}

impl RetrievalConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| RetrievalError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| RetrievalError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Set the store configuration.
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    /// Set the embedding dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.extractor.dimension = dimension;
        self
    }

    /// Set the ingestion configuration.
    pub fn with_ingest(mut self, ingest: IngestConfig) -> Self {
        self.ingest = ingest;
        self
    }

    /// Set the query configuration.
    pub fn with_query(mut self, query: QueryConfig) -> Self {
        self.query = query;
        self
    }

    /// Embedding dimension shared by the extractor and the store.
    pub fn dimension(&self) -> usize {
        self.extractor.dimension
    }

    /// Reject values no pipeline can run with.
    pub fn validate(&self) -> Result<()> {
        if self.extractor.dimension == 0 {
            return Err(RetrievalError::Config(
                "extractor.dimension must be positive".to_string(),
            ));
        }
        if self.ingest.max_concurrency == 0 {
            return Err(RetrievalError::Config(
                "ingest.max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.ingest.extensions.is_empty() {
            return Err(RetrievalError::Config(
                "ingest.extensions must not be empty".to_string(),
            ));
        }
        if self.query.timeout_secs == 0 || self.ingest.extraction_timeout_secs == 0 {
            return Err(RetrievalError::Config(
                "timeouts must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the embedding extractor service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Base URL of the embedding service.
    pub base_url: String,

    /// Dimension of the embeddings it produces.
    pub dimension: usize,

    /// Name used in logs.
    pub name: Option<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            dimension: DEFAULT_DIMENSION,
            name: None,
        }
    }
}

/// Configuration for bulk ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Maximum number of extractions in flight.
    pub max_concurrency: usize,

    /// File extensions to ingest (case-insensitive, without the dot).
    pub extensions: Vec<String>,

    /// Whether to descend into subdirectories.
    pub recursive: bool,

    /// Maximum depth when recursing (None = unlimited).
    pub max_depth: Option<usize>,

    /// Whether to ingest hidden files.
    pub process_hidden: bool,

    /// Per-item extraction deadline in seconds.
    pub extraction_timeout_secs: u64,
}

impl IngestConfig {
    /// Per-item extraction deadline.
    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }

    /// Set the concurrency bound.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Descend into subdirectories.
    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 2,
            extensions: vec!["wav".to_string()],
            recursive: false,
            max_depth: None,
            process_hidden: false,
            extraction_timeout_secs: 120,
        }
    }
}

/// Configuration for queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Number of matches returned when the caller does not ask for a count.
    pub default_k: usize,

    /// Extraction deadline in seconds.
    pub timeout_secs: u64,

    /// Largest accepted audio payload in bytes.
    pub max_audio_bytes: usize,
}

impl QueryConfig {
    /// Extraction deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_k: 3,
            timeout_secs: 30,
            max_audio_bytes: 16 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn test_defaults() {
        let config = RetrievalConfig::new();
        assert_eq!(config.dimension(), 192);
        assert_eq!(config.query.default_k, 3);
        assert_eq!(config.ingest.extensions, vec!["wav".to_string()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_overrides_sections() {
        let config = RetrievalConfig::from_toml_str(
            r#"
            [extractor]
            base_url = "http://embedder:9000"
            dimension = 256

            [store]
            backend = "jsonl"
            path = "/var/lib/voicematch/voice_samples.jsonl"

            [ingest]
            max_concurrency = 4
            recursive = true

            [query]
            default_k = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.extractor.base_url, "http://embedder:9000");
        assert_eq!(config.dimension(), 256);
        assert_eq!(
            config.store,
            StoreConfig::Jsonl {
                path: PathBuf::from("/var/lib/voicematch/voice_samples.jsonl")
            }
        );
        assert_eq!(config.ingest.max_concurrency, 4);
        assert!(config.ingest.recursive);
        assert_eq!(config.ingest.extensions, vec!["wav".to_string()]);
        assert_eq!(config.query.default_k, 5);
        assert_eq!(config.query.timeout_secs, 30);
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let err = RetrievalConfig::from_toml_str("[ingest]\nmax_concurrency = 0\n").unwrap_err();
        assert!(matches!(err, RetrievalError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_zero_dimension() {
        let config = RetrievalConfig::new().with_dimension(0);
        assert!(config.validate().is_err());
    }
}
