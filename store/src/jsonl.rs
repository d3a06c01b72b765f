//! Append-only JSON-lines embedding store.
//!
//! Each record is one line of JSON. The file is read once at open; after
//! that, inserts append a line and then publish the record to the in-memory
//! view that `scan` reads.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::EmbeddingStore;
use crate::error::{Result, StoreError};
use crate::record::VoiceSampleRecord;
use crate::reservation::Reservations;

#[derive(Debug, Default)]
struct State {
    records: Vec<VoiceSampleRecord>,
    identifiers: HashSet<String>,
}

/// Store backed by a JSON-lines file.
pub struct JsonlStore {
    /// Path to the data file.
    path: PathBuf,

    /// Published records.
    state: RwLock<State>,

    /// Append handle; one line is written at a time.
    file: Mutex<File>,

    /// Identifiers with an insert in flight.
    reservations: Reservations,

    /// Embedding dimension for new records.
    dimension: usize,
}

impl JsonlStore {
    /// Open or create the store at `path`.
    ///
    /// Lines that fail to parse are logged and skipped. Records of another
    /// dimension are kept as legacy records.
    pub async fn open(path: impl AsRef<Path>, dimension: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    StoreError::StorageUnavailable(format!("{}: {e}", parent.display()))
                })?;
            }
        }

        let mut state = State::default();
        let mut needs_newline = false;

        if fs::try_exists(&path).await? {
            let content = fs::read_to_string(&path)
                .await
                .map_err(|e| StoreError::StorageUnavailable(format!("{}: {e}", path.display())))?;
            needs_newline = !content.is_empty() && !content.ends_with('\n');

            for (line_no, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<VoiceSampleRecord>(line) {
                    Ok(record) => {
                        if state.identifiers.insert(record.identifier.clone()) {
                            state.records.push(record);
                        } else {
                            warn!(
                                "Ignoring repeated identifier {} at {}:{}",
                                record.identifier,
                                path.display(),
                                line_no + 1
                            );
                        }
                    }
                    Err(e) => {
                        warn!("Skipping unreadable record at {}:{}: {e}", path.display(), line_no + 1);
                    }
                }
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StoreError::StorageUnavailable(format!("{}: {e}", path.display())))?;

        // A torn final line must not swallow the next record.
        if needs_newline {
            file.write_all(b"\n").await?;
            file.flush().await?;
        }

        info!(
            "Loaded {} voice samples from {}",
            state.records.len(),
            path.display()
        );

        Ok(Self::from_parts(path, state, file, dimension))
    }

    fn from_parts(path: PathBuf, state: State, file: File, dimension: usize) -> Self {
        Self {
            path,
            state: RwLock::new(state),
            file: Mutex::new(file),
            reservations: Reservations::default(),
            dimension,
        }
    }

    /// Path to the data file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line and wait until it is on disk.
    ///
    /// On failure the file is cut back to its previous length so a torn
    /// line cannot swallow the next record.
    async fn append(&self, record: &VoiceSampleRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = self.file.lock().await;
        let previous_len = file.metadata().await.map_err(|e| self.unavailable(e))?.len();

        let written = async {
            file.write_all(line.as_bytes()).await?;
            file.flush().await?;
            file.sync_data().await
        }
        .await;

        if let Err(e) = written {
            if let Err(truncate_err) = truncate(&mut file, previous_len).await {
                warn!(
                    "Failed to roll back partial record in {}: {truncate_err}",
                    self.path.display()
                );
            }
            return Err(self.unavailable(e));
        }
        Ok(())
    }

    fn unavailable(&self, err: std::io::Error) -> StoreError {
        StoreError::StorageUnavailable(format!("{}: {err}", self.path.display()))
    }
}

/// Cut `file` back to `len` bytes, discarding a partially written line.
async fn truncate(file: &mut File, len: u64) -> std::io::Result<()> {
    // Surfaces and clears any error left by an earlier background write.
    let _ = file.flush().await;
    file.set_len(len).await?;
    file.sync_data().await
}

#[async_trait]
impl EmbeddingStore for JsonlStore {
    fn name(&self) -> &str {
        "jsonl"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn insert(&self, record: VoiceSampleRecord) -> Result<()> {
        record.validate(self.dimension)?;

        let _reservation = self.reservations.reserve(&record.identifier).await;

        if self.state.read().await.identifiers.contains(&record.identifier) {
            return Err(StoreError::DuplicateIdentifier(record.identifier));
        }

        self.append(&record).await?;

        let mut state = self.state.write().await;
        state.identifiers.insert(record.identifier.clone());
        debug!("Stored voice sample: {}", record.identifier);
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
