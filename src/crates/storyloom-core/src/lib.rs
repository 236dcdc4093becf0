//! # storyloom-core — checkpointed fan-out/fan-in workflow execution
//!
//! A stateful, durable execution runtime for fixed directed graphs of work
//! units. The engine provides parallel dispatch with deterministic
//! aggregation, durable state that survives process restarts, suspension of
//! execution awaiting an external human decision (with resumption from the
//! exact suspension point), and well-defined failure semantics.
//!
//! ## Building blocks
//!
//! - [`state::StateSchema`] — per-field merge rules: scalars are last-writer-
//!   wins, reducer fields are append-only lists merged by concatenation.
//! - [`node::NodeRegistry`] — declarative node definitions: name, async
//!   handler, concurrency kind (linear / fan-out source / fan-in sink).
//! - [`graph::WorkflowGraph`] — nodes plus edges; conditional edges carry
//!   deterministic router closures that may return dynamic
//!   [`dispatch::DispatchUnit`] lists for fan-out.
//! - [`executor::Executor`] — the per-thread round loop: bounded worker pool,
//!   linearized patch commits, a snapshot after every commit, fan-in gating,
//!   suspension, cancellation.
//! - [`events`] — structured per-node execution events correlated by thread
//!   id.
//! - [`retry::RetryPolicy`] — exponential backoff used by provider adapters.
//!
//! Durability lives in the companion `storyloom-checkpoint` crate; the
//! executor is generic over any [`storyloom_checkpoint::SnapshotStore`].
//!
//! ## A minimal graph
//!
//! ```rust
//! use storyloom_core::{Executor, RunOutcome, WorkflowGraph};
//! use storyloom_core::node::{NodeKind, NodeOutput, NodeSpec, END};
//! use storyloom_core::state::StateSchema;
//! use storyloom_checkpoint::InMemorySnapshotStore;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut graph = WorkflowGraph::new(StateSchema::new());
//! graph.add_node(NodeSpec::new("greet", NodeKind::Linear, |_ctx| {
//!     Box::pin(async move { Ok(NodeOutput::Patch(json!({"greeting": "hello"}))) })
//! }));
//! graph.set_entry("greet");
//! graph.add_edge("greet", END);
//!
//! let executor = Executor::new(graph, Arc::new(InMemorySnapshotStore::new()));
//! let outcome = executor.submit("thread-1", json!({})).await?;
//! assert!(matches!(outcome, RunOutcome::Terminal { .. }));
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod executor;
pub mod graph;
pub mod node;
pub mod retry;
pub mod state;

pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use dispatch::{DispatchUnit, RouteOutcome};
pub use error::{EngineError, Result};
pub use events::{EventSink, ExecutionEvent, RecordingEventSink, TracingEventSink};
pub use executor::{Executor, RunOutcome, DEFAULT_POOL_SIZE};
pub use graph::{Edge, Router, WorkflowGraph};
pub use node::{NodeContext, NodeHandler, NodeId, NodeKind, NodeOutput, NodeRegistry, NodeSpec, END};
pub use retry::{RetryPolicy, RetryState};
pub use state::{AppendReducer, OverwriteReducer, Reducer, StateSchema, TRANSIENT_PREFIX};
