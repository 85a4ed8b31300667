//! Lifecycle Controller - the operations UI glue calls
//!
//! `ChunkVault` owns a `StoreOpener` and opens the store on first use. Every
//! operation goes through `store()` first, so callers never deal with open
//! state. Storage failures come back as the crate's user-facing `Error`
//! categories.

use std::num::NonZeroUsize;
use std::path::Path;

use tokio::io::AsyncWrite;
use tokio::sync::OnceCell;

use crate::config::{self, Settings};
use crate::progress::ProgressSink;
use crate::reader::ChunkReader;
use crate::source::ByteSource;
use crate::storage::{ChunkStore, SqliteOpener, StoreOpener, StoreStats};
use crate::writer::ChunkWriter;
use crate::{Error, Result, DEFAULT_MIME_TYPE};

/// The reassembled file, tagged with the media type it should be played as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackBlob {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl PlaybackBlob {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Chunked storage for one file at a time.
///
/// Operations must be serialized by the caller: an upload has to finish
/// before playback or deletion starts.
pub struct ChunkVault<O: StoreOpener> {
    opener: O,
    store: OnceCell<O::Store>,
    writer: ChunkWriter,
    mime_type: String,
}

impl ChunkVault<SqliteOpener> {
    /// Vault over the SQLite database described by `settings`
    pub fn from_settings(settings: &Settings) -> Self {
        let opener = SqliteOpener::new(&settings.database).with_quota(settings.quota_bytes);
        Self::new(opener)
            .with_chunk_size(settings.chunk_size)
            .with_mime_type(settings.mime_type.clone())
    }

    /// Vault configured from `path` (default `chunkvault.toml`), or from the
    /// defaults when the file does not exist. Creates the database directory.
    pub fn from_config_file(path: Option<&Path>) -> anyhow::Result<Self> {
        let settings = match config::load_config(path)? {
            Some(cfg) => cfg.resolve()?,
            None => Settings::default(),
        };
        config::ensure_db_dir(&settings.database)?;
        tracing::debug!("Using chunk store at {:?}", settings.database);
        Ok(Self::from_settings(&settings))
    }
}

impl<O: StoreOpener> ChunkVault<O> {
    pub fn new(opener: O) -> Self {
        Self {
            opener,
            store: OnceCell::new(),
            writer: ChunkWriter::default(),
            mime_type: DEFAULT_MIME_TYPE.to_string(),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: NonZeroUsize) -> Self {
        self.writer = ChunkWriter::new(chunk_size);
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn opener(&self) -> &O {
        &self.opener
    }

    /// Open the store if it is not open yet. A failed open is not remembered,
    /// so the next call tries again.
    async fn store(&self) -> Result<&O::Store> {
        self.store
            .get_or_try_init(|| async {
                tracing::debug!("Opening chunk store");
                self.opener.open().await
            })
            .await
            .map_err(|e| {
                tracing::error!("Chunk store unavailable: {}", e);
                Error::from(e)
            })
    }

    /// Split `source` into chunks and persist them, reporting progress after
    /// each chunk. Returns the number of chunks written.
    ///
    /// On failure, chunks committed before the error stay stored; call
    /// `delete_stored_file` before retrying.
    pub async fn upload_file<S, P>(&self, mut source: S, mut on_progress: P) -> Result<usize>
    where
        S: ByteSource,
        P: ProgressSink,
    {
        let store = self.store().await?;
        self.writer
            .write(store, &mut source, &mut on_progress)
            .await
            .inspect(|chunks| tracing::info!("File uploaded as {} chunks", chunks))
            .inspect_err(|e| tracing::error!("Error saving file: {}", e))
    }

    /// Reassemble the stored file. Resolves to an empty blob when nothing is
    /// stored.
    pub async fn play_stored_file(&self) -> Result<PlaybackBlob> {
        let store = self.store().await?;
        let bytes = ChunkReader::new(store)
            .read_all()
            .await
            .inspect_err(|e| tracing::error!("Error playing file: {}", e))?;

        Ok(PlaybackBlob {
            bytes,
            mime_type: self.mime_type.clone(),
        })
    }

    /// Write the stored file to `sink` chunk by chunk
    pub async fn stream_stored_file<W>(&self, sink: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let store = self.store().await?;
        ChunkReader::new(store)
            .stream_to(sink)
            .await
            .inspect_err(|e| tracing::error!("Error streaming file: {}", e))
    }

    /// Remove every stored chunk
    pub async fn delete_stored_file(&self) -> Result<()> {
        let store = self.store().await?;
        store
            .clear_all()
            .await
            .map_err(Error::from)
            .inspect(|_| tracing::info!("Stored file deleted"))
            .inspect_err(|e| tracing::error!("Error deleting file: {}", e))
    }

    /// Chunk count and stored bytes
    pub async fn stats(&self) -> Result<StoreStats> {
        let store = self.store().await?;
        Ok(store.stats().await?)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }
}
