//! Chunk Writer - splits a source into fixed-size chunks and appends them in order

use std::num::NonZeroUsize;

use crate::progress::{self, ProgressSink};
use crate::source::ByteSource;
use crate::storage::ChunkStore;
use crate::{Error, Result, CHUNK_SIZE};

/// Number of chunks a source of `size` bytes is split into. Fails when the
/// count does not fit in `usize` on this target.
pub fn total_chunks(size: u64, chunk_size: NonZeroUsize) -> Result<usize> {
    let count = size.div_ceil(chunk_size.get() as u64);
    usize::try_from(count).map_err(|_| {
        Error::OperationFailed(format!(
            "source of {} bytes needs {} chunks, more than this platform can count",
            size, count
        ))
    })
}

/// State of one upload pass. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    pub source_size: u64,
    pub chunk_size: usize,
    pub chunks_written: usize,
    pub total_chunks: usize,
}

impl UploadSession {
    pub fn new(source_size: u64, chunk_size: NonZeroUsize) -> Result<Self> {
        Ok(Self {
            source_size,
            chunk_size: chunk_size.get(),
            chunks_written: 0,
            total_chunks: total_chunks(source_size, chunk_size)?,
        })
    }

    /// `(offset, len)` of every window, in offset order. The last window is
    /// truncated to the remaining bytes.
    pub fn windows(&self) -> impl Iterator<Item = (u64, usize)> + use<> {
        let size = self.source_size;
        let chunk = self.chunk_size as u64;
        (0..self.total_chunks as u64).map(move |i| {
            let offset = i * chunk;
            (offset, chunk.min(size - offset) as usize)
        })
    }

    pub fn fraction(&self) -> f64 {
        progress::fraction(self.chunks_written, self.total_chunks)
    }

    pub fn is_complete(&self) -> bool {
        self.chunks_written == self.total_chunks
    }
}

/// Writes a source into a `ChunkStore`, one chunk per record.
#[derive(Debug, Clone, Copy)]
pub struct ChunkWriter {
    chunk_size: NonZeroUsize,
}

impl Default for ChunkWriter {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(CHUNK_SIZE).unwrap_or(NonZeroUsize::MIN))
    }
}

impl ChunkWriter {
    pub fn new(chunk_size: NonZeroUsize) -> Self {
        Self { chunk_size }
    }

    pub fn chunk_size(&self) -> NonZeroUsize {
        self.chunk_size
    }

    /// Append every window of `source` to `store` and return the number of
    /// chunks written.
    ///
    /// Windows are read and appended strictly one after another so record ids
    /// follow source offsets. The first failure aborts the pass; chunks that
    /// were already committed stay in the store.
    pub async fn write<St, S, P>(&self, store: &St, source: &mut S, progress: &mut P) -> Result<usize>
    where
        St: ChunkStore + ?Sized,
        S: ByteSource + ?Sized,
        P: ProgressSink + ?Sized,
    {
        let mut session = UploadSession::new(source.size(), self.chunk_size)?;
        tracing::info!(
            "Writing {} bytes as {} chunks of {} bytes",
            session.source_size,
            session.total_chunks,
            session.chunk_size
        );
        progress.started(session.total_chunks);

        for (offset, len) in session.windows() {
            if let Err(e) = self.write_window(store, source, offset, len).await {
                tracing::warn!(
                    "Upload aborted at chunk {} of {}: {}",
                    session.chunks_written + 1,
                    session.total_chunks,
                    e
                );
                progress.failed(&e.to_string());
                return Err(e);
            }

            session.chunks_written += 1;
            progress.report(session.chunks_written, session.total_chunks);
        }

        debug_assert!(session.is_complete());
        progress.finished();
        Ok(session.chunks_written)
    }

    async fn write_window<St, S>(&self, store: &St, source: &mut S, offset: u64, len: usize) -> Result<()>
    where
        St: ChunkStore + ?Sized,
        S: ByteSource + ?Sized,
    {
        let payload = source.read_window(offset, len).await.map_err(Error::Io)?;
        let id = store.append(payload).await?;
        tracing::debug!("Stored bytes {}..{} as chunk {}", offset, offset + len as u64, id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, StorageError};
    use async_trait::async_trait;

    fn chunk_size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_total_chunks() {
        let c = chunk_size(4);
        assert_eq!(total_chunks(0, c).unwrap(), 0);
        assert_eq!(total_chunks(1, c).unwrap(), 1);
        assert_eq!(total_chunks(4, c).unwrap(), 1);
        assert_eq!(total_chunks(5, c).unwrap(), 2);
        assert_eq!(total_chunks(8, c).unwrap(), 2);
        assert_eq!(total_chunks(9, c).unwrap(), 3);
        assert_eq!(total_chunks(u64::MAX, chunk_size(1)).ok(), usize::try_from(u64::MAX).ok());
    }

    #[test]
    fn test_windows_cover_source() {
        let mut session = UploadSession::new(10, chunk_size(4)).unwrap();
        let windows: Vec<_> = session.windows().collect();
        assert_eq!(windows, vec![(0, 4), (4, 4), (8, 2)]);

        assert_eq!(session.fraction(), 0.0);
        session.chunks_written = 3;
        assert!(session.is_complete());
        assert_eq!(session.fraction(), 1.0);
    }

    #[tokio::test]
    async fn test_chunk_count_matches_ceiling() {
        for (size, chunk) in [(0, 3), (1, 3), (3, 3), (7, 3), (9, 3), (10, 1), (5, 100)] {
            let store = MemoryStore::new();
            let mut source = sample(size);
            let written = ChunkWriter::new(chunk_size(chunk))
                .write(&store, &mut source, &mut crate::NoProgress)
                .await
                .unwrap();

            assert_eq!(written, size.div_ceil(chunk), "size {size}, chunk {chunk}");
            assert_eq!(store.stats().await.unwrap().chunks, written);
        }
    }

    #[tokio::test]
    async fn test_default_chunk_size_scenario() {
        let store = MemoryStore::new();
        let mut source = sample(2_500_000);
        let mut fractions = Vec::new();
        let mut on_progress = |f: f64| fractions.push(f);

        let written = ChunkWriter::default()
            .write(&store, &mut source, &mut on_progress)
            .await
            .unwrap();

        assert_eq!(written, 3);
        let sizes: Vec<_> = store.records().await.iter().map(|c| c.payload.len()).collect();
        assert_eq!(sizes, vec![1_048_576, 1_048_576, 402_848]);

        assert_eq!(fractions.len(), 3);
        assert!((fractions[0] - 1.0 / 3.0).abs() < 1e-9);
        assert!((fractions[1] - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(fractions[2], 1.0);
    }

    #[tokio::test]
    async fn test_progress_is_monotonic() {
        let store = MemoryStore::new();
        let mut source = sample(1000);
        let mut fractions = Vec::new();
        let mut on_progress = |f: f64| fractions.push(f);

        ChunkWriter::new(chunk_size(33))
            .write(&store, &mut source, &mut on_progress)
            .await
            .unwrap();

        assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(fractions.last().copied(), Some(1.0));
    }

    #[tokio::test]
    async fn test_empty_source_writes_nothing() {
        let store = MemoryStore::new();
        let mut source: Vec<u8> = Vec::new();
        let mut calls = 0;
        let mut on_progress = |_f: f64| calls += 1;

        let written = ChunkWriter::default()
            .write(&store, &mut source, &mut on_progress)
            .await
            .unwrap();

        assert_eq!(written, 0);
        assert_eq!(calls, 0);
        assert!(store.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_quota_on_second_append_aborts() {
        let store = MemoryStore::new();
        store
            .fail_append_at(2, StorageError::QuotaExceeded("full".into()))
            .await;
        let mut source = sample(2_500_000);
        let mut fractions = Vec::new();
        let mut on_progress = |f: f64| fractions.push(f);

        let err = ChunkWriter::default()
            .write(&store, &mut source, &mut on_progress)
            .await
            .unwrap_err();

        assert!(err.is_quota());
        assert_eq!(store.records().await.len(), 1);
        assert_eq!(fractions.len(), 1);
    }

    struct BrokenSource;

    #[async_trait]
    impl ByteSource for BrokenSource {
        fn size(&self) -> u64 {
            10
        }

        async fn read_window(&mut self, offset: u64, len: usize) -> std::io::Result<Vec<u8>> {
            if offset == 0 {
                Ok(vec![0; len])
            } else {
                Err(std::io::Error::other("read failed"))
            }
        }
    }

    #[tokio::test]
    async fn test_source_error_aborts() {
        let store = MemoryStore::new();
        let err = ChunkWriter::new(chunk_size(4))
            .write(&store, &mut BrokenSource, &mut crate::NoProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Io(_)));
        assert_eq!(store.records().await.len(), 1);
    }
}
