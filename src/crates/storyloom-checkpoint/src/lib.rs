//! # storyloom-checkpoint — durable state for workflow threads
//!
//! Snapshot types and the [`SnapshotStore`] trait that give the storyloom
//! engine its durability: every committed node patch is persisted before the
//! executor acknowledges progress, suspension payloads ride inside the
//! snapshot (never a side channel), and a thread can be resumed from its
//! latest snapshot by a fresh process.
//!
//! ## Core concepts
//!
//! - [`Snapshot`] — `(state, completed task keys, frontier, suspension?,
//!   status)` at one monotonic sequence number.
//! - [`SnapshotStore`] — thread-keyed, append-oriented persistence with
//!   `put` (atomic upsert on `(thread_id, seq)`) and `latest`.
//! - [`InMemorySnapshotStore`] — the reference backend, good for tests and a
//!   template for PostgreSQL/Redis/object-store implementations.
//! - [`SerializerProtocol`] — pluggable blob encoding for backends that
//!   store snapshots opaquely.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use storyloom_checkpoint::{InMemorySnapshotStore, PendingTask, Snapshot, SnapshotStore};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = InMemorySnapshotStore::new();
//!
//!     let snapshot = Snapshot::initial(
//!         json!({"prompt": "a mouse finds cheese"}),
//!         vec![PendingTask::new("input_moderator")],
//!     );
//!     store.put("job-42", snapshot).await?;
//!
//!     let latest = store.latest("job-42").await?.expect("just written");
//!     assert_eq!(latest.seq, 0);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod memory;
pub mod serializer;
pub mod snapshot;
pub mod store;

pub use error::{CheckpointError, Result};
pub use memory::InMemorySnapshotStore;
pub use serializer::{JsonSerializer, SerializerProtocol};
pub use snapshot::{ErrorRecord, PendingTask, RunStatus, Snapshot, Suspension, ThreadId};
pub use store::SnapshotStore;
