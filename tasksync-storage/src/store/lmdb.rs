//! LMDB-backed durable task store.
//!
//! Uses the heed crate (Rust bindings for LMDB). Tasks are stored in a single
//! unnamed database keyed by the task id bytes, with the JSON-encoded task as
//! the value. Iteration therefore follows key order.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The store uses:
//! - Read transactions for `fetch_all` and `fetch_one`
//! - One write transaction per `upsert`, `upsert_all` and `delete`

use std::path::Path;

use async_trait::async_trait;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use tasksync_core::{Task, TaskError, TaskResult};
use tracing::debug;

use super::{storage_key, TaskStore};

/// Error type for LMDB store operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbStoreError> for TaskError {
    fn from(e: LmdbStoreError) -> Self {
        TaskError::storage(e.to_string())
    }
}

fn txn_err(e: heed::Error) -> LmdbStoreError {
    LmdbStoreError::Transaction(e.to_string())
}

/// Durable task store on a memory-mapped LMDB environment.
///
/// # Example
///
/// ```ignore
/// let store = LmdbTaskStore::open("/var/lib/tasksync", 64)?;
/// store.upsert(&Task::new("a", "title", "")).await?;
/// let all = store.fetch_all().await?;
/// ```
pub struct LmdbTaskStore {
    env: Env,
    db: Database<Bytes, Bytes>,
}

impl LmdbTaskStore {
    /// Open (creating if needed) a store in `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStoreError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn().map_err(txn_err)?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;
        wtxn.commit().map_err(txn_err)?;

        debug!(path = %path.as_ref().display(), max_size_mb, "Opened LMDB task store");
        Ok(Self { env, db })
    }

    fn encode(task: &Task) -> Result<Vec<u8>, LmdbStoreError> {
        serde_json::to_vec(task).map_err(|e| LmdbStoreError::Serialization(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<Task, LmdbStoreError> {
        serde_json::from_slice(bytes).map_err(|e| LmdbStoreError::Deserialization(e.to_string()))
    }

    /// Number of stored tasks.
    pub fn len(&self) -> Result<u64, LmdbStoreError> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        self.db.len(&rtxn).map_err(txn_err)
    }

    pub fn is_empty(&self) -> Result<bool, LmdbStoreError> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl TaskStore for LmdbTaskStore {
    async fn fetch_all(&self) -> TaskResult<Vec<Task>> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        let mut tasks = Vec::new();
        for entry in self.db.iter(&rtxn).map_err(txn_err)? {
            let (_, value) = entry.map_err(txn_err)?;
            tasks.push(Self::decode(value)?);
        }
        Ok(tasks)
    }

    async fn fetch_one(&self, id: &str) -> TaskResult<Option<Task>> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        match self.db.get(&rtxn, id.as_bytes()).map_err(txn_err)? {
            Some(bytes) => Ok(Some(Self::decode(bytes)?)),
            None => Ok(None),
        }
    }

    async fn upsert(&self, task: &Task) -> TaskResult<()> {
        let key = storage_key(task)?;
        let value = Self::encode(task)?;

        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        self.db
            .put(&mut wtxn, key.as_bytes(), &value)
            .map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;
        Ok(())
    }

    async fn upsert_all(&self, tasks: &[Task]) -> TaskResult<()> {
        let mut encoded = Vec::with_capacity(tasks.len());
        for task in tasks {
            encoded.push((storage_key(task)?, Self::encode(task)?));
        }

        // A dropped write transaction aborts, so an error leaves nothing behind.
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        for (key, value) in &encoded {
            self.db
                .put(&mut wtxn, key.as_bytes(), value)
                .map_err(txn_err)?;
        }
        wtxn.commit().map_err(txn_err)?;
        debug!(count = tasks.len(), "Stored task batch");
        Ok(())
    }

    async fn delete(&self, id: &str) -> TaskResult<bool> {
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        let deleted = self.db.delete(&mut wtxn, id.as_bytes()).map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;
        Ok(deleted)
    }
}
