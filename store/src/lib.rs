//! # Embedding Store
//!
//! Append-mostly persistence of [`VoiceSampleRecord`]s.
//!
//! Every backend implements [`EmbeddingStore`]:
//!
//! - [`MemoryStore`]: process-local, used by tests and one-shot runs
//! - [`JsonlStore`]: one JSON record per line in an append-only file
//! - [`SqliteStore`]: the `voice_samples` table in a SQLite database
//!
//! Stores reject records whose embedding dimension differs from the
//! configured one, but may still hold legacy records from an earlier
//! configuration. Readers must tolerate those.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod codec;
pub mod error;
pub mod jsonl;
pub mod memory;
pub mod record;
mod reservation;
pub mod sqlite;

pub use codec::{decode_embedding, encode_embedding};
pub use error::{Result, StoreError};
pub use jsonl::JsonlStore;
pub use memory::MemoryStore;
pub use record::VoiceSampleRecord;
pub use sqlite::SqliteStore;

/// Persistence contract for voice sample records.
///
/// Implementations must allow concurrent `scan` and `insert` calls. A scan
/// observes each concurrent insert either fully or not at all, and two
/// inserts of the same identifier never both succeed.
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &str;

    /// Embedding dimension new records must have.
    fn dimension(&self) -> usize;

    /// Write a new record.
    ///
    /// Fails with [`StoreError::DuplicateIdentifier`] if the identifier is
    /// taken; the existing record is left untouched.
    async fn insert(&self, record: VoiceSampleRecord) -> Result<()>;

    /// Read every stored record, in storage order.
    async fn scan(&self) -> Result<Vec<VoiceSampleRecord>>;

    /// Number of stored records.
    async fn len(&self) -> Result<usize>;

    /// Whether the store has no records.
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Whether a record with `identifier` exists.
    async fn contains(&self, identifier: &str) -> Result<bool>;
}

/// Which backend to open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Process-local store; contents are lost on exit.
    Memory,

    /// Append-only JSON-lines file.
    Jsonl { path: PathBuf },

    /// SQLite database file.
    Sqlite { path: PathBuf },
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("voicematch.db"),
        }
    }
}

/// Open the store described by `config`.
pub async fn open_store(config: &StoreConfig, dimension: usize) -> Result<Arc<dyn EmbeddingStore>> {
    let store: Arc<dyn EmbeddingStore> = match config {
        StoreConfig::Memory => Arc::new(MemoryStore::new(dimension)),
        StoreConfig::Jsonl { path } => Arc::new(JsonlStore::open(path, dimension).await?),
        StoreConfig::Sqlite { path } => Arc::new(SqliteStore::open(path, dimension).await?),
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_store_config_from_json() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"backend": "jsonl", "path": "/tmp/samples.jsonl"}"#).unwrap();
        assert_eq!(
            config,
            StoreConfig::Jsonl {
                path: PathBuf::from("/tmp/samples.jsonl")
            }
        );

        let config: StoreConfig = serde_json::from_str(r#"{"backend": "memory"}"#).unwrap();
        assert_eq!(config, StoreConfig::Memory);
    }

    #[tokio::test]
    async fn test_open_store_for_every_backend() {
        let temp_dir = TempDir::new().unwrap();
        let configs = vec![
            StoreConfig::Memory,
            StoreConfig::Jsonl {
                path: temp_dir.path().join("samples.jsonl"),
            },
            StoreConfig::Sqlite {
                path: temp_dir.path().join("samples.db"),
            },
        ];

        for config in configs {
            let store = open_store(&config, 2).await.unwrap();
            store
                .insert(VoiceSampleRecord::new("a.wav", 1.0, vec![0.5, 0.5]))
                .await
                .unwrap();
            let records = store.scan().await.unwrap();
            assert_eq!(records.len(), 1, "backend {}", store.name());
            assert_eq!(records[0].embedding, vec![0.5, 0.5]);
            assert!(!store.is_empty().await.unwrap());
        }
    }
}
