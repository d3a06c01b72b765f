//! In-memory embedding store.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::EmbeddingStore;
use crate::error::{Result, StoreError};
use crate::record::VoiceSampleRecord;

#[derive(Debug, Default)]
struct State {
    /// Records in insertion order.
    records: Vec<VoiceSampleRecord>,

    /// Identifiers present in `records`.
    identifiers: HashSet<String>,
}

/// Process-local store.
///
/// The duplicate check and the append happen under one write lock, so
/// readers see each insert atomically.
#[derive(Debug)]
pub struct MemoryStore {
    state: RwLock<State>,
    dimension: usize,
}

impl MemoryStore {
    /// Create an empty store for embeddings of `dimension`.
    pub fn new(dimension: usize) -> Self {
        Self {
            state: RwLock::new(State::default()),
            dimension,
        }
    }

    /// Seed the store with records, bypassing the dimension check.
    ///
    /// Used to model records left behind by an earlier configuration.
    pub async fn with_legacy_records(self, records: Vec<VoiceSampleRecord>) -> Self {
        {
            let mut state = self.state.write().await;
            for record in records {
                if state.identifiers.insert(record.identifier.clone()) {
                    state.records.push(record);
                }
            }
        }
        self
    }
}

#[async_trait]
impl EmbeddingStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn insert(&self, record: VoiceSampleRecord) -> Result<()> {
        record.validate(self.dimension)?;

        let mut state = self.state.write().await;
        if state.identifiers.contains(&record.identifier) {
            return Err(StoreError::DuplicateIdentifier(record.identifier));
        }

        debug!("Stored voice sample: {}", record.identifier);
        state.identifiers.insert(record.identifier.clone());
        state.records.push(record);
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<VoiceSampleRecord>> {
        Ok(self.state.read().await.records.clone())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.state.read().await.records.len())
    }

    async fn contains(&self, identifier: &str) -> Result<bool> {
        Ok(self.state.read().await.identifiers.contains(identifier))
    }
}
