//! In-memory implementation of `ChunkStore`

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{ChunkCursor, ChunkId, ChunkStore, StorageError, StoreOpener, StoreStats, StoredChunk};

/// Planned failure for the n-th append (1-based, counted over the store's lifetime)
#[derive(Debug, Clone)]
struct FailurePlan {
    at: usize,
    error: StorageError,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: ChunkId,
    records: BTreeMap<ChunkId, Vec<u8>>,
    appends: usize,
    quota_bytes: Option<u64>,
    failure: Option<FailurePlan>,
}

impl Inner {
    fn used_bytes(&self) -> u64 {
        self.records.values().map(|p| p.len() as u64).sum()
    }
}

/// In-memory chunk store for development and testing.
///
/// Ids come from a monotonic counter that a clear does not reset. Cloning
/// shares the underlying records.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Creates a new empty store without a quota.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject appends that would take the stored payload past `quota_bytes`.
    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                quota_bytes: Some(quota_bytes),
                ..Inner::default()
            })),
        }
    }

    /// Make the `n`-th append (1-based) fail with `error`.
    pub async fn fail_append_at(&self, n: usize, error: StorageError) {
        let mut inner = self.inner.lock().await;
        inner.failure = Some(FailurePlan { at: n, error });
    }

    /// Snapshot of all records in id order
    pub async fn records(&self) -> Vec<StoredChunk> {
        let inner = self.inner.lock().await;
        inner
            .records
            .iter()
            .map(|(id, payload)| StoredChunk {
                id: *id,
                payload: payload.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl ChunkStore for MemoryStore {
    async fn append(&self, payload: Vec<u8>) -> Result<ChunkId, StorageError> {
        let mut inner = self.inner.lock().await;
        inner.appends += 1;

        if let Some(plan) = &inner.failure {
            if plan.at == inner.appends {
                return Err(plan.error.clone());
            }
        }

        if let Some(quota) = inner.quota_bytes {
            let used = inner.used_bytes();
            if used + payload.len() as u64 > quota {
                return Err(StorageError::QuotaExceeded(format!(
                    "{} bytes used, {} more requested, quota is {}",
                    used,
                    payload.len(),
                    quota
                )));
            }
        }

        inner.next_id += 1;
        let id = inner.next_id;
        inner.records.insert(id, payload);
        Ok(id)
    }

    async fn drain_in_order(&self) -> Result<ChunkCursor, StorageError> {
        let records = self.records().await;
        let (sender, cursor) = ChunkCursor::channel(records.len());
        for chunk in records {
            sender
                .try_send(Ok(chunk))
                .map_err(|e| StorageError::TransactionFailed(e.to_string()))?;
        }
        Ok(cursor)
    }

    async fn clear_all(&self) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().await;
        inner.records.clear();
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats, StorageError> {
        let inner = self.inner.lock().await;
        Ok(StoreStats {
            chunks: inner.records.len(),
            bytes: inner.used_bytes(),
        })
    }
}

/// Hands out a shared `MemoryStore`, or fails like an engine that cannot open
#[derive(Debug, Clone, Default)]
pub struct MemoryOpener {
    store: MemoryStore,
    unavailable: Option<String>,
}

impl MemoryOpener {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            unavailable: None,
        }
    }

    /// An opener whose every `open` fails with `StorageError::Unavailable`
    pub fn unavailable(reason: &str) -> Self {
        Self {
            store: MemoryStore::new(),
            unavailable: Some(reason.to_string()),
        }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

#[async_trait]
impl StoreOpener for MemoryOpener {
    type Store = MemoryStore;

    async fn open(&self) -> Result<MemoryStore, StorageError> {
        match &self.unavailable {
            Some(reason) => Err(StorageError::Unavailable(reason.clone())),
            None => Ok(self.store.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ids_are_monotonic() {
        let store = MemoryStore::new();
        let first = store.append(vec![1]).await.unwrap();
        let second = store.append(vec![2]).await.unwrap();
        store.clear_all().await.unwrap();
        let third = store.append(vec![3]).await.unwrap();

        assert!(first < second && second < third);
    }

    #[tokio::test]
    async fn test_drain_in_append_order() {
        let store = MemoryStore::new();
        for payload in [b"c".to_vec(), b"a".to_vec(), b"b".to_vec()] {
            store.append(payload).await.unwrap();
        }

        let drained = store.drain_in_order().await.unwrap().collect().await.unwrap();
        let payloads: Vec<_> = drained.into_iter().map(|c| c.payload).collect();
        assert_eq!(payloads, vec![b"c".to_vec(), b"a".to_vec(), b"b".to_vec()]);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = MemoryStore::new();
        store
            .fail_append_at(2, StorageError::QuotaExceeded("full".into()))
            .await;

        store.append(vec![1]).await.unwrap();
        let err = store.append(vec![2]).await.unwrap_err();
        assert_eq!(err, StorageError::QuotaExceeded("full".into()));
        store.append(vec![3]).await.unwrap();

        assert_eq!(store.stats().await.unwrap().chunks, 2);
    }

    #[tokio::test]
    async fn test_quota() {
        let store = MemoryStore::with_quota(10);
        store.append(vec![0; 6]).await.unwrap();
        let err = store.append(vec![0; 6]).await.unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded(_)));
        assert_eq!(store.stats().await.unwrap(), StoreStats { chunks: 1, bytes: 6 });
    }

    #[tokio::test]
    async fn test_unavailable_opener() {
        let opener = MemoryOpener::unavailable("no engine");
        let err = opener.open().await.unwrap_err();
        assert_eq!(err, StorageError::Unavailable("no engine".into()));
    }
}
