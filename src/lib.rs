//! # Chunkvault - chunked local storage for large binary files
//!
//! Stores one large blob (typically a video) as a sequence of fixed-size
//! chunks in an embedded SQLite database and reassembles it for playback.
//!
//! Chunkvault provides:
//! - A storage handle over a single versioned record collection (`FileChunks`)
//! - A sequential chunk writer with progress reporting
//! - An ordered chunk reader that rebuilds or streams the original bytes
//! - A lifecycle controller (`ChunkVault`) that opens the store lazily and maps
//!   storage failures to user-facing error categories

pub mod storage;
pub mod source;
pub mod progress;
pub mod writer;
pub mod reader;
pub mod vault;
pub mod config;
pub mod ui;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// Re-exports for convenient access
pub use storage::{ChunkCursor, ChunkId, ChunkStore, StorageError, StoreOpener, StoredChunk};
pub use storage::{MemoryOpener, MemoryStore, SqliteOpener, SqliteStore, StoreStats};
pub use source::{ByteSource, FileSource};
pub use progress::{NoProgress, ProgressChannel, ProgressSink};
pub use ui::ProgressMessage;
pub use writer::{ChunkWriter, UploadSession};
pub use reader::ChunkReader;
pub use vault::{ChunkVault, PlaybackBlob};

/// Name of the database the chunks live in
pub const DB_NAME: &str = "LargeFileDB";

/// Schema version of the database
pub const DB_VERSION: i64 = 1;

/// Name of the single record collection
pub const STORE_NAME: &str = "FileChunks";

/// Bytes per stored chunk (1 MiB)
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Media type attached to reassembled blobs unless configured otherwise
pub const DEFAULT_MIME_TYPE: &str = "video/mp4";

/// Result type alias for Chunkvault operations
pub type Result<T> = std::result::Result<T, Error>;

/// User-facing error categories
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Unavailable(msg) => Error::StorageUnavailable(msg),
            StorageError::QuotaExceeded(msg) => Error::QuotaExceeded(msg),
            StorageError::TransactionFailed(msg) => Error::OperationFailed(msg),
        }
    }
}

impl Error {
    /// True when the user can fix the failure by freeing space
    pub fn is_quota(&self) -> bool {
        matches!(self, Error::QuotaExceeded(_))
    }
}

/// Install the global tracing subscriber.
///
/// `verbose` switches the filter from `info` to `debug`. Calling this more than
/// once is harmless; later calls leave the first subscriber in place.
pub fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let _ = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init();
}
