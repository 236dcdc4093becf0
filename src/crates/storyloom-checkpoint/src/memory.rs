//! In-memory reference implementation of [`SnapshotStore`]
//!
//! Suitable for tests, local development, and as a template for real
//! backends. Histories live in a `HashMap<ThreadId, BTreeMap<seq, Snapshot>>`
//! behind a `tokio::sync::RwLock`, so concurrent threads can read and write
//! independent histories without blocking each other on the async runtime.

use crate::error::{CheckpointError, Result};
use crate::snapshot::{Snapshot, ThreadId};
use crate::store::SnapshotStore;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

type Histories = Arc<RwLock<HashMap<ThreadId, BTreeMap<u64, Snapshot>>>>;

/// In-memory snapshot store
///
/// Cloning is cheap and shares the underlying storage.
#[derive(Clone, Default)]
pub struct InMemorySnapshotStore {
    histories: Histories,
}

impl InMemorySnapshotStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of threads with at least one snapshot
    pub async fn thread_count(&self) -> usize {
        self.histories.read().await.len()
    }

    /// Total number of snapshots across all threads
    pub async fn snapshot_count(&self) -> usize {
        self.histories
            .read()
            .await
            .values()
            .map(|h| h.len())
            .sum()
    }

    /// Drop all stored snapshots (useful in tests)
    pub async fn clear(&self) {
        self.histories.write().await.clear();
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn put(&self, thread_id: &str, snapshot: Snapshot) -> Result<()> {
        let mut histories = self.histories.write().await;
        let history = histories.entry(thread_id.to_string()).or_default();

        if let Some((&highest, _)) = history.iter().next_back() {
            if snapshot.seq < highest {
                return Err(CheckpointError::Invalid(format!(
                    "non-monotonic seq {} for thread {} (highest committed: {})",
                    snapshot.seq, thread_id, highest
                )));
            }
        }

        history.insert(snapshot.seq, snapshot);
        Ok(())
    }

    async fn latest(&self, thread_id: &str) -> Result<Option<Snapshot>> {
        let histories = self.histories.read().await;
        Ok(histories
            .get(thread_id)
            .and_then(|h| h.values().next_back().cloned()))
    }

    async fn history(&self, thread_id: &str) -> Result<Vec<Snapshot>> {
        let histories = self.histories.read().await;
        Ok(histories
            .get(thread_id)
            .map(|h| h.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn threads(&self) -> Result<Vec<ThreadId>> {
        let histories = self.histories.read().await;
        Ok(histories.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{PendingTask, RunStatus};
    use serde_json::json;

    #[tokio::test]
    async fn test_put_and_latest() {
        let store = InMemorySnapshotStore::new();
        let snap = Snapshot::initial(json!({"k": 1}), vec![PendingTask::new("entry")]);
        store.put("t1", snap.clone()).await.unwrap();

        let loaded = store.latest("t1").await.unwrap().unwrap();
        assert_eq!(loaded.seq, 0);
        assert_eq!(loaded.state, json!({"k": 1}));
    }

    #[tokio::test]
    async fn test_latest_returns_highest_seq() {
        let store = InMemorySnapshotStore::new();
        let first = Snapshot::initial(json!({}), vec![]);
        let mut second = first.next();
        second.state = json!({"done": true});

        store.put("t1", first).await.unwrap();
        store.put("t1", second).await.unwrap();

        let loaded = store.latest("t1").await.unwrap().unwrap();
        assert_eq!(loaded.seq, 1);
        assert_eq!(loaded.state, json!({"done": true}));
    }

    #[tokio::test]
    async fn test_unknown_thread_is_none() {
        let store = InMemorySnapshotStore::new();
        assert!(store.latest("missing").await.unwrap().is_none());
        assert!(store.history("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_non_monotonic_seq() {
        let store = InMemorySnapshotStore::new();
        let first = Snapshot::initial(json!({}), vec![]);
        let second = first.next();

        store.put("t1", second).await.unwrap();
        let err = store.put("t1", first).await.unwrap_err();
        assert!(matches!(err, CheckpointError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_upsert_same_seq_replaces() {
        let store = InMemorySnapshotStore::new();
        let snap = Snapshot::initial(json!({"v": 1}), vec![]);
        let mut replacement = snap.clone();
        replacement.state = json!({"v": 2});
        replacement.status = RunStatus::AwaitingResume;

        store.put("t1", snap).await.unwrap();
        store.put("t1", replacement).await.unwrap();

        let history = store.history("t1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].state, json!({"v": 2}));
    }

    #[tokio::test]
    async fn test_threads_enumeration() {
        let store = InMemorySnapshotStore::new();
        store
            .put("a", Snapshot::initial(json!({}), vec![]))
            .await
            .unwrap();
        store
            .put("b", Snapshot::initial(json!({}), vec![]))
            .await
            .unwrap();

        let mut threads = store.threads().await.unwrap();
        threads.sort();
        assert_eq!(threads, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(store.thread_count().await, 2);
        assert_eq!(store.snapshot_count().await, 2);
    }
}
