//! Storage Layer - the chunk record collection
//!
//! One versioned database holding one collection of records:
//! - FileChunks(id, chunk)
//!
//! `id` is assigned by the store, strictly increasing in insertion order, and
//! is the only ordering key used when the chunks are reassembled.
//!
//! Two backends implement `ChunkStore`:
//! - `SqliteStore` - the persistent store
//! - `MemoryStore` - in-memory stand-in with quota and failure injection

pub mod schema;
pub mod sqlite;
pub mod memory;

use async_trait::async_trait;
use rusqlite::ErrorCode;
use tokio::sync::mpsc;

pub use memory::{MemoryOpener, MemoryStore};
pub use sqlite::{SqliteOpener, SqliteStore};

/// Identifier of a stored chunk, assigned by the store on append
pub type ChunkId = i64;

/// Storage-layer failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// The engine could not be opened or initialised
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A write was rejected because the space limit was hit
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Any other read, write or clear failure
    #[error("transaction failed: {0}")]
    TransactionFailed(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DiskFull) => StorageError::QuotaExceeded(err.to_string()),
            _ => StorageError::TransactionFailed(err.to_string()),
        }
    }
}

/// One record of the collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredChunk {
    pub id: ChunkId,
    pub payload: Vec<u8>,
}

/// Summary of what the collection currently holds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub chunks: usize,
    pub bytes: u64,
}

impl std::fmt::Display for StoreStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Store Statistics:")?;
        writeln!(f, "  Chunks: {}", self.chunks)?;
        writeln!(f, "  Bytes: {}", self.bytes)
    }
}

/// Record-level operations on the chunk collection.
///
/// A value implementing this trait only exists after a successful open, so
/// every operation runs against an initialised store.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Insert `payload` as a new record with the next id.
    async fn append(&self, payload: Vec<u8>) -> Result<ChunkId, StorageError>;

    /// Iterate all records in ascending id order.
    ///
    /// The cursor is single-pass; draining again requires a new call.
    async fn drain_in_order(&self) -> Result<ChunkCursor, StorageError>;

    /// Remove every record in one write transaction. Clearing an empty
    /// collection succeeds.
    async fn clear_all(&self) -> Result<(), StorageError>;

    /// Count records and payload bytes.
    async fn stats(&self) -> Result<StoreStats, StorageError>;
}

/// Opens (creating if needed) a `ChunkStore`
#[async_trait]
pub trait StoreOpener: Send + Sync {
    type Store: ChunkStore;

    async fn open(&self) -> Result<Self::Store, StorageError>;
}

/// Forward-only cursor over the records of one drain.
///
/// Records arrive through a bounded channel fed by the backend. After an
/// error has been yielded the cursor is exhausted.
pub struct ChunkCursor {
    rx: mpsc::Receiver<Result<StoredChunk, StorageError>>,
    done: bool,
}

impl ChunkCursor {
    /// Create a cursor and the sender the backend feeds it through
    pub(crate) fn channel(
        capacity: usize,
    ) -> (mpsc::Sender<Result<StoredChunk, StorageError>>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self { rx, done: false })
    }

    /// Next record, or `None` once the drain is complete
    pub async fn next(&mut self) -> Option<Result<StoredChunk, StorageError>> {
        if self.done {
            return None;
        }

        match self.rx.recv().await {
            Some(Ok(chunk)) => Some(Ok(chunk)),
            Some(Err(e)) => {
                self.done = true;
                self.rx.close();
                Some(Err(e))
            }
            None => {
                self.done = true;
                None
            }
        }
    }

    /// Drain the remaining records into a vector
    pub async fn collect(mut self) -> Result<Vec<StoredChunk>, StorageError> {
        let mut chunks = Vec::new();
        while let Some(chunk) = self.next().await {
            chunks.push(chunk?);
        }
        Ok(chunks)
    }
}
