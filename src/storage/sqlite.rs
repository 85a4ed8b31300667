//! SQLite storage implementation

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, TransactionBehavior};
use tokio::sync::mpsc;

use super::schema;
use super::{ChunkCursor, ChunkId, ChunkStore, StorageError, StoreOpener, StoreStats, StoredChunk};
use crate::DB_VERSION;

/// Records buffered between the drain thread and the cursor
const DRAIN_BUFFER: usize = 4;

/// SQLite-backed chunk collection.
///
/// All statements run on tokio's blocking pool against a single connection,
/// so two operations never touch the collection at the same time. A drain
/// holds the connection until its cursor is exhausted or dropped.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a database file (creates if doesn't exist).
    ///
    /// `quota_bytes` caps the database size; appends past it fail with
    /// `StorageError::QuotaExceeded`.
    pub fn open(path: &Path, quota_bytes: Option<u64>) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(unavailable)?;
        Self::from_connection(conn, quota_bytes)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(unavailable)?;
        Self::from_connection(conn, None)
    }

    fn from_connection(mut conn: Connection, quota_bytes: Option<u64>) -> Result<Self, StorageError> {
        initialize_schema(&mut conn)?;
        if let Some(quota) = quota_bytes {
            apply_quota(&conn, quota)?;
        }
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Schema version recorded in the database
    pub fn schema_version(&self) -> Result<i64, StorageError> {
        let conn = lock(&self.conn)?;
        Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&conn)?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StorageError::TransactionFailed(e.to_string()))?
    }
}

/// Initialize or upgrade the database schema
fn initialize_schema(conn: &mut Connection) -> Result<(), StorageError> {
    let current: i64 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(unavailable)?;

    if current > DB_VERSION {
        return Err(StorageError::Unavailable(format!(
            "database version {} is newer than supported version {}",
            current, DB_VERSION
        )));
    }
    if current == DB_VERSION {
        return Ok(());
    }

    let tx = conn.transaction().map_err(unavailable)?;
    for (from, stmts) in schema::pending_migrations(current) {
        tracing::debug!("Migrating chunk store from version {} to {}", from, from + 1);
        for stmt in stmts {
            tx.execute_batch(stmt).map_err(unavailable)?;
        }
    }
    tx.pragma_update(None, "user_version", DB_VERSION)
        .map_err(unavailable)?;
    tx.commit().map_err(unavailable)?;

    tracing::info!("Chunk store schema at version {}", DB_VERSION);
    Ok(())
}

/// Cap the database file at roughly `quota` bytes
fn apply_quota(conn: &Connection, quota: u64) -> Result<(), StorageError> {
    let page_size: i64 = conn
        .pragma_query_value(None, "page_size", |row| row.get(0))
        .map_err(unavailable)?;
    let max_pages = (quota / page_size.max(1) as u64).max(1) as i64;

    let applied: i64 = conn
        .pragma_update_and_check(None, "max_page_count", max_pages, |row| row.get(0))
        .map_err(unavailable)?;
    tracing::debug!("Chunk store quota: {} pages of {} bytes", applied, page_size);
    Ok(())
}

fn unavailable(err: rusqlite::Error) -> StorageError {
    StorageError::Unavailable(err.to_string())
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, StorageError> {
    conn.lock()
        .map_err(|_| StorageError::TransactionFailed("connection lock poisoned".to_string()))
}

/// Feed every record, in id order, into `sender`. Stops quietly when the
/// cursor has been dropped.
fn drain_blocking(
    conn: &Mutex<Connection>,
    sender: &mpsc::Sender<Result<StoredChunk, StorageError>>,
) -> Result<(), StorageError> {
    let mut guard = lock(conn)?;
    let tx = guard.transaction_with_behavior(TransactionBehavior::Deferred)?;
    {
        let mut stmt = tx.prepare("SELECT id, chunk FROM FileChunks ORDER BY id ASC")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let chunk = StoredChunk {
                id: row.get(0)?,
                payload: row.get(1)?,
            };
            if sender.blocking_send(Ok(chunk)).is_err() {
                tracing::debug!("Chunk cursor dropped before the drain finished");
                return Ok(());
            }
        }
    }
    tx.commit()?;
    Ok(())
}

#[async_trait]
impl ChunkStore for SqliteStore {
    async fn append(&self, payload: Vec<u8>) -> Result<ChunkId, StorageError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute("INSERT INTO FileChunks (chunk) VALUES (?1)", params![payload])?;
            let id = tx.last_insert_rowid();
            tx.commit()?;
            Ok(id)
        })
        .await
    }

    async fn drain_in_order(&self) -> Result<ChunkCursor, StorageError> {
        let (sender, cursor) = ChunkCursor::channel(DRAIN_BUFFER);
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            if let Err(e) = drain_blocking(&conn, &sender) {
                tracing::warn!("Chunk drain failed: {}", e);
                let _ = sender.blocking_send(Err(e));
            }
        });

        Ok(cursor)
    }

    async fn clear_all(&self) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let removed = tx.execute("DELETE FROM FileChunks", [])?;
            tx.commit()?;
            tracing::debug!("Cleared {} chunks", removed);
            Ok(())
        })
        .await
    }

    async fn stats(&self) -> Result<StoreStats, StorageError> {
        self.with_conn(|conn| {
            let (chunks, bytes): (i64, i64) = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(LENGTH(chunk)), 0) FROM FileChunks",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            Ok(StoreStats {
                chunks: chunks as usize,
                bytes: bytes as u64,
            })
        })
        .await
    }
}

/// Opens a `SqliteStore` at a fixed path
#[derive(Debug, Clone)]
pub struct SqliteOpener {
    path: PathBuf,
    quota_bytes: Option<u64>,
}

impl SqliteOpener {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            quota_bytes: None,
        }
    }

    pub fn with_quota(mut self, quota_bytes: Option<u64>) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StoreOpener for SqliteOpener {
    type Store = SqliteStore;

    async fn open(&self) -> Result<SqliteStore, StorageError> {
        let path = self.path.clone();
        let quota = self.quota_bytes;
        tracing::debug!("Opening chunk store at {:?}", path);
        tokio::task::spawn_blocking(move || SqliteStore::open(&path, quota))
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?
    }
}
