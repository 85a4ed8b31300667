//! Chunk Reader - reassembles stored chunks in id order

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::storage::ChunkStore;
use crate::Result;

/// Rebuilds the stored blob from a `ChunkStore`.
///
/// Chunks are opaque; only their id order matters.
pub struct ChunkReader<'a, St: ChunkStore + ?Sized> {
    store: &'a St,
}

impl<'a, St: ChunkStore + ?Sized> ChunkReader<'a, St> {
    pub fn new(store: &'a St) -> Self {
        Self { store }
    }

    /// Concatenate every chunk into one contiguous blob. An empty collection
    /// yields an empty blob.
    pub async fn read_all(&self) -> Result<Vec<u8>> {
        let mut cursor = self.store.drain_in_order().await?;
        let mut blob = Vec::new();
        let mut chunks = 0usize;

        while let Some(chunk) = cursor.next().await {
            let chunk = chunk?;
            blob.extend_from_slice(&chunk.payload);
            chunks += 1;
        }

        tracing::info!("Reassembled {} chunks into {} bytes", chunks, blob.len());
        Ok(blob)
    }

    /// Write every chunk to `sink` as it is drained, without holding the whole
    /// blob in memory. Returns the number of bytes written.
    pub async fn stream_to<W>(&self, sink: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut cursor = self.store.drain_in_order().await?;
        let mut written = 0u64;

        while let Some(chunk) = cursor.next().await {
            let chunk = chunk?;
            sink.write_all(&chunk.payload).await?;
            written += chunk.payload.len() as u64;
        }
        sink.flush().await?;

        tracing::info!("Streamed {} bytes", written);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, SqliteStore};
    use crate::writer::ChunkWriter;
    use std::num::NonZeroUsize;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 256) as u8).collect()
    }

    #[tokio::test]
    async fn test_round_trip_memory() {
        for size in [0, 1, 15, 16, 17, 100] {
            let store = MemoryStore::new();
            let original = sample(size);
            let mut source = original.clone();
            ChunkWriter::new(NonZeroUsize::new(16).unwrap())
                .write(&store, &mut source, &mut crate::NoProgress)
                .await
                .unwrap();

            let blob = ChunkReader::new(&store).read_all().await.unwrap();
            assert_eq!(blob, original, "size {size}");
        }
    }

    #[tokio::test]
    async fn test_round_trip_sqlite() {
        let store = SqliteStore::open_in_memory().unwrap();
        let original = sample(3 * 1024 + 5);
        let mut source = original.as_slice();
        ChunkWriter::new(NonZeroUsize::new(1024).unwrap())
            .write(&store, &mut source, &mut crate::NoProgress)
            .await
            .unwrap();

        let blob = ChunkReader::new(&store).read_all().await.unwrap();
        assert_eq!(blob, original);
    }

    #[tokio::test]
    async fn test_read_empty() {
        let store = MemoryStore::new();
        let blob = ChunkReader::new(&store).read_all().await.unwrap();
        assert!(blob.is_empty());
    }

    #[tokio::test]
    async fn test_payloads_concatenate_in_append_order() {
        let store = MemoryStore::new();
        store.append(b"hello ".to_vec()).await.unwrap();
        store.append(Vec::new()).await.unwrap();
        store.append(b"world".to_vec()).await.unwrap();

        let blob = ChunkReader::new(&store).read_all().await.unwrap();
        assert_eq!(blob, b"hello world");
    }

    #[tokio::test]
    async fn test_stream_to_sink() {
        let store = SqliteStore::open_in_memory().unwrap();
        for part in [b"ab".to_vec(), b"cd".to_vec(), b"e".to_vec()] {
            store.append(part).await.unwrap();
        }

        let mut sink: Vec<u8> = Vec::new();
        let written = ChunkReader::new(&store).stream_to(&mut sink).await.unwrap();
        assert_eq!(written, 5);
        assert_eq!(sink, b"abcde");
    }
}
