//! Extensible snapshot storage trait for custom backend implementations
//!
//! This module defines [`SnapshotStore`] — the abstraction the executor writes
//! through after every committed node patch. The trait enables downstream
//! projects to back the engine with any storage system (PostgreSQL, SQLite,
//! Redis, object storage) while keeping the engine itself storage-agnostic.
//!
//! # Contract
//!
//! - **Durability before progress** — the executor awaits `put` before it
//!   acknowledges progress past a node. A backend must not return until the
//!   snapshot is committed to whatever durability level it promises.
//! - **Keyed upsert** — `put` upserts on `(thread_id, seq)`. Writing the same
//!   `(thread_id, seq)` twice replaces the earlier record; writing a `seq`
//!   lower than one already stored for the thread is a contract violation and
//!   backends should reject it with [`CheckpointError::Invalid`].
//! - **Latest wins** — `latest` returns the snapshot with the highest
//!   committed `seq`, or `None` for an unknown thread.
//! - **Thread isolation** — different thread ids never observe each other's
//!   history. Within one thread id the executor serializes writes, so
//!   backends only need cross-thread concurrency safety.
//!
//! # Example: custom backend
//!
//! ```rust,ignore
//! use storyloom_checkpoint::{Snapshot, SnapshotStore, ThreadId};
//! use async_trait::async_trait;
//!
//! struct PostgresSnapshotStore { pool: sqlx::PgPool }
//!
//! #[async_trait]
//! impl SnapshotStore for PostgresSnapshotStore {
//!     async fn put(&self, thread_id: &str, snapshot: Snapshot) -> storyloom_checkpoint::Result<()> {
//!         let blob = serde_json::to_value(&snapshot)?;
//!         sqlx::query(
//!             "INSERT INTO snapshots (thread_id, seq, blob) VALUES ($1, $2, $3)
//!              ON CONFLICT (thread_id, seq) DO UPDATE SET blob = $3",
//!         )
//!         .bind(thread_id).bind(snapshot.seq as i64).bind(blob)
//!         .execute(&self.pool).await
//!         .map_err(|e| storyloom_checkpoint::CheckpointError::Storage(e.to_string()))?;
//!         Ok(())
//!     }
//!     // latest / history / threads elided
//! #   async fn latest(&self, _: &str) -> storyloom_checkpoint::Result<Option<Snapshot>> { Ok(None) }
//! #   async fn history(&self, _: &str) -> storyloom_checkpoint::Result<Vec<Snapshot>> { Ok(vec![]) }
//! #   async fn threads(&self) -> storyloom_checkpoint::Result<Vec<ThreadId>> { Ok(vec![]) }
//! }
//! ```

use crate::error::Result;
use crate::snapshot::{Snapshot, ThreadId};
use async_trait::async_trait;

/// Storage backend for per-thread snapshot histories
///
/// Implementations must be `Send + Sync`; the engine shares a single store
/// across every concurrently running thread via `Arc<dyn SnapshotStore>`.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persist a snapshot, upserting on `(thread_id, seq)`
    ///
    /// Must reject a `seq` lower than the highest already committed for this
    /// thread.
    async fn put(&self, thread_id: &str, snapshot: Snapshot) -> Result<()>;

    /// Return the highest-seq committed snapshot for the thread, if any
    async fn latest(&self, thread_id: &str) -> Result<Option<Snapshot>>;

    /// Return the full ordered snapshot history for the thread (ascending
    /// seq); empty for an unknown thread
    async fn history(&self, thread_id: &str) -> Result<Vec<Snapshot>>;

    /// Enumerate every thread id the store knows about
    ///
    /// Used by the resume-deadline sweeper and by operational inspection.
    async fn threads(&self) -> Result<Vec<ThreadId>>;
}
