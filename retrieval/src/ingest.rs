//! Bulk ingestion of voice samples.
//!
//! Every item runs `Pending → Extracted → Stored`, or ends in `Failed`.
//! A failed item is recorded in the summary and never stops the batch.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use voicematch_embeddings::{EmbeddingExtractor, decode_wav_file};
use voicematch_store::{EmbeddingStore, StoreError, VoiceSampleRecord};

use crate::config::IngestConfig;
use crate::error::Result;
use crate::source::{AudioItem, list_audio_files};

/// Lifecycle of one ingested item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Pending,
    Extracted,
    Stored,
    Failed,
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Extracted => "extracted",
            Self::Stored => "stored",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Why an item was not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Audio could not be decoded or embedded.
    ExtractionError,
    /// The extractor exceeded the per-item deadline.
    ExtractionTimeout,
    /// The embedding dimension differs from the store's.
    DimensionMismatch,
    /// The record failed validation (e.g. zero duration).
    InvalidRecord,
    /// A record with the same identifier already exists.
    DuplicateIdentifier,
    /// The store could not be written.
    StorageUnavailable,
    /// The worker task died.
    TaskFailed,
}

impl From<&StoreError> for FailureKind {
    fn from(err: &StoreError) -> Self {
        match err {
            StoreError::DuplicateIdentifier(_) => Self::DuplicateIdentifier,
            StoreError::DimensionMismatch { .. } => Self::DimensionMismatch,
            StoreError::InvalidRecord(_) => Self::InvalidRecord,
            StoreError::StorageUnavailable(_) | StoreError::Serialization(_) => {
                Self::StorageUnavailable
            }
        }
    }
}

/// One item that was not stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestFailure {
    /// Identifier of the item.
    pub identifier: String,

    /// Failure category.
    pub reason: FailureKind,

    /// Human-readable detail.
    pub message: String,
}

/// Outcome of an ingestion batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestSummary {
    /// Number of items stored.
    pub succeeded: usize,

    /// Items that failed, sorted by identifier.
    pub failed: Vec<IngestFailure>,

    /// Whether the batch was cancelled before every item started.
    pub interrupted: bool,

    /// Items never started because of cancellation.
    pub not_started: usize,
}

impl IngestSummary {
    /// Number of items that were attempted.
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed.len()
    }
}

/// Extracts and stores a batch of audio items.
pub struct IngestionPipeline {
    extractor: Arc<dyn EmbeddingExtractor>,
    store: Arc<dyn EmbeddingStore>,
    config: IngestConfig,
}

impl IngestionPipeline {
    /// Create a pipeline over the given collaborators.
    pub fn new(
        extractor: Arc<dyn EmbeddingExtractor>,
        store: Arc<dyn EmbeddingStore>,
        config: IngestConfig,
    ) -> Self {
        Self {
            extractor,
            store,
            config,
        }
    }

    /// Ingest every audio file in `dir`.
    pub async fn ingest_directory(&self, dir: &Path) -> Result<IngestSummary> {
        self.ingest_directory_with_cancel(dir, CancellationToken::new())
            .await
    }

    /// Ingest every audio file in `dir`, stopping early when `cancel` fires.
    ///
    /// Items already in flight are allowed to finish.
    pub async fn ingest_directory_with_cancel(
        &self,
        dir: &Path,
        cancel: CancellationToken,
    ) -> Result<IngestSummary> {
        let items = list_audio_files(dir, &self.config)?;
        info!("Ingesting {} audio files from {}", items.len(), dir.display());
        Ok(self.ingest_items(items, cancel).await)
    }

    /// Ingest an explicit list of items.
    pub async fn ingest_items(
        &self,
        items: Vec<AudioItem>,
        cancel: CancellationToken,
    ) -> IngestSummary {
        let start = std::time::Instant::now();
        let total = items.len();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let timeout = self.config.extraction_timeout();

        let mut summary = IngestSummary::default();
        let mut tasks = JoinSet::new();
        let mut identifiers = HashMap::new();

        for (started, item) in items.into_iter().enumerate() {
            let permit = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                summary.interrupted = true;
                summary.not_started = total - started;
                warn!(
                    "Ingestion interrupted, {} items not started",
                    summary.not_started
                );
                break;
            };

            let extractor = Arc::clone(&self.extractor);
            let store = Arc::clone(&self.store);
            let identifier = item.identifier.clone();
            let handle = tasks.spawn(async move {
                let outcome = ingest_one(extractor.as_ref(), store.as_ref(), &item, timeout).await;
                drop(permit);
                outcome
            });
            identifiers.insert(handle.id(), identifier);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, Ok(()))) => summary.succeeded += 1,
                Ok((_, Err(failure))) => summary.failed.push(failure),
                Err(join_err) => {
                    let identifier = identifiers
                        .remove(&join_err.id())
                        .unwrap_or_default();
                    error!("Ingestion task for {identifier} failed: {join_err}");
                    summary.failed.push(IngestFailure {
                        identifier,
                        reason: FailureKind::TaskFailed,
                        message: join_err.to_string(),
                    });
                }
            }
        }

        summary
            .failed
            .sort_by(|a, b| a.identifier.as_str().cmp(b.identifier.as_str()));

        info!(
            "Ingestion complete: {} stored, {} failed, {} not started in {}ms",
            summary.succeeded,
            summary.failed.len(),
            summary.not_started,
            start.elapsed().as_millis()
        );

        summary
    }
}

/// Decode, extract and store one item.
async fn ingest_one(
    extractor: &dyn EmbeddingExtractor,
    store: &dyn EmbeddingStore,
    item: &AudioItem,
    timeout: Duration,
) -> std::result::Result<(), IngestFailure> {
    let identifier = item.identifier.as_str();
    debug!("{identifier}: {}", ItemState::Pending);

    let fail = |reason: FailureKind, message: String| {
        warn!("{identifier}: {} ({reason:?}): {message}", ItemState::Failed);
        IngestFailure {
            identifier: identifier.to_string(),
            reason,
            message,
        }
    };

    let path = item.path.clone();
    let clip = match tokio::task::spawn_blocking(move || decode_wav_file(path)).await {
        Ok(Ok(clip)) => clip,
        Ok(Err(e)) => return Err(fail(FailureKind::ExtractionError, e.to_string())),
        Err(e) => return Err(fail(FailureKind::TaskFailed, e.to_string())),
    };

    let extracted = match tokio::time::timeout(timeout, extractor.extract(&clip)).await {
        Ok(Ok(extracted)) => extracted,
        Ok(Err(e)) => return Err(fail(FailureKind::ExtractionError, e.to_string())),
        Err(_) => {
            return Err(fail(
                FailureKind::ExtractionTimeout,
                format!("no embedding after {timeout:?}"),
            ));
        }
    };
    debug!("{identifier}: {}", ItemState::Extracted);

    if extracted.dimension() != store.dimension() {
        return Err(fail(
            FailureKind::DimensionMismatch,
            format!(
                "expected {} dimensions, got {}",
                store.dimension(),
                extracted.dimension()
            ),
        ));
    }

    let duration_seconds = if extracted.duration_seconds > 0.0 {
        extracted.duration_seconds
    } else {
        clip.duration_seconds()
    };

    let record = VoiceSampleRecord::new(identifier, duration_seconds, extracted.embedding);
    if let Err(e) = store.insert(record).await {
        return Err(fail(FailureKind::from(&e), e.to_string()));
    }

    debug!("{identifier}: {}", ItemState::Stored);
    Ok(())
}
