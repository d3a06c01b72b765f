//! SQLite-backed embedding store.
//!
//! Records live in the `voice_samples` table; the embedding column holds the
//! JSON text produced by [`crate::codec`]. Uniqueness is enforced by the
//! primary key, so duplicate detection holds across processes too.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use rusqlite::{Connection, ErrorCode, params};
use tracing::{debug, info, warn};

use crate::EmbeddingStore;
use crate::codec::{decode_embedding, encode_embedding};
use crate::error::{Result, StoreError};
use crate::record::VoiceSampleRecord;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS voice_samples (
    identifier TEXT PRIMARY KEY NOT NULL,
    duration   REAL NOT NULL,
    embedding  TEXT NOT NULL
);
";

/// Store backed by a SQLite database.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    dimension: usize,
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub async fn open(path: impl AsRef<Path>, dimension: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection> {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let conn = Connection::open(&path)?;
            conn.execute_batch(SCHEMA_SQL)?;
            info!("Opened voice sample database at {}", path.display());
            Ok(conn)
        })
        .await
        .map_err(|e| StoreError::StorageUnavailable(format!("open task failed: {e}")))??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            dimension,
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory(dimension: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            dimension,
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::StorageUnavailable(format!("database task failed: {e}")))?
    }
}

#[async_trait]
impl EmbeddingStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn insert(&self, record: VoiceSampleRecord) -> Result<()> {
        record.validate(self.dimension)?;
        let embedding = encode_embedding(&record.embedding)?;

        self.with_conn(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO voice_samples (identifier, duration, embedding) VALUES (?1, ?2, ?3)",
                params![record.identifier, record.duration_seconds, embedding],
            );
            match inserted {
                Ok(_) => {
                    debug!("Stored voice sample: {}", record.identifier);
                    Ok(())
                }
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::DuplicateIdentifier(record.identifier))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn scan(&self) -> Result<Vec<VoiceSampleRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT identifier, duration, embedding FROM voice_samples ORDER BY rowid",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;

            let mut records = Vec::new();
            for row in rows {
                let (identifier, duration_seconds, embedding) = row?;
                match decode_embedding(&embedding) {
                    Ok(embedding) => records.push(VoiceSampleRecord {
                        identifier,
                        duration_seconds,
                        embedding,
                    }),
                    Err(e) => warn!("Skipping voice sample {identifier} with unreadable embedding: {e}"),
                }
            }
            Ok(records)
        })
        .await
    }

    async fn len(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM voice_samples", [], |row| row.get(0))?;
            usize::try_from(count)
                .map_err(|_| StoreError::StorageUnavailable(format!("invalid row count {count}")))
        })
        .await
    }

    async fn contains(&self, identifier: &str) -> Result<bool> {
        let identifier = identifier.to_string();
        self.with_conn(move |conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM voice_samples WHERE identifier = ?1)",
                params![identifier],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sqlite_insert_then_scan() {
        let store = SqliteStore::open_in_memory(3).unwrap();
        let first = VoiceSampleRecord::new("b.wav", 1.25, vec![0.1, 0.2, 0.3]);
        let second = VoiceSampleRecord::new("a.wav", 4.0, vec![-0.3, 0.0, 7.5]);

        store.insert(first.clone()).await.unwrap();
        store.insert(second.clone()).await.unwrap();

        assert_eq!(store.scan().await.unwrap(), vec![first, second]);
        assert_eq!(store.len().await.unwrap(), 2);
        assert!(store.contains("a.wav").await.unwrap());
        assert!(!store.contains("c.wav").await.unwrap());
    }

    #[tokio::test]
    async fn test_sqlite_duplicate_identifier() {
        let store = SqliteStore::open_in_memory(2).unwrap();
        let original = VoiceSampleRecord::new("a.wav", 1.0, vec![1.0, 0.0]);
        store.insert(original.clone()).await.unwrap();

        let err = store
            .insert(VoiceSampleRecord::new("a.wav", 2.0, vec![0.0, 1.0]))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::DuplicateIdentifier(_)));
        assert_eq!(store.scan().await.unwrap(), vec![original]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_sqlite_concurrent_same_identifier() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(
            SqliteStore::open(temp_dir.path().join("voicematch.db"), 1)
                .await
                .unwrap(),
        );

        let mut handles = Vec::new();
        for i in 0..16u8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .insert(VoiceSampleRecord::new("same.wav", 1.0, vec![f32::from(i) + 1.0]))
                    .await
            }));
        }

        let mut ok = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => ok += 1,
                Err(err) => assert!(matches!(err, StoreError::DuplicateIdentifier(_))),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_persistence_and_legacy_rows() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("voicematch.db");

        {
            let store = SqliteStore::open(&path, 4).await.unwrap();
            store
                .insert(VoiceSampleRecord::new("old.wav", 1.0, vec![1.0; 4]))
                .await
                .unwrap();
        }

        // Reopened with a different dimension: old rows are still readable.
        let store = SqliteStore::open(&path, 2).await.unwrap();
        let records = store.scan().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].dimension(), 4);
    }
}
