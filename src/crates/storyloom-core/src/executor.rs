//! The per-thread execution loop
//!
//! The executor drives one workflow thread at a time through rounds of
//! frontier execution:
//!
//! ```text
//!  load-or-init snapshot
//!        │
//!        ▼
//!  ┌──► pick batch from frontier (fan-in sinks deferred while other
//!  │    work remains; already-committed task keys skipped)
//!  │         │
//!  │         ▼
//!  │    run batch concurrently on a bounded worker pool
//!  │      · each handler gets an immutable view: state ⊕ overlay
//!  │      · as each patch arrives: merge → run the node's router
//!  │        against the merged state → snapshot (with successors)
//!  │         │
//!  │         ▼
//!  │    drain: suspension? permanent error? cancellation?
//!  │         │
//!  │         ▼
//!  └─── advance the frontier to the deferred sinks + routed successors
//!
//!  frontier empty → terminal snapshot → RunOutcome
//! ```
//!
//! # Guarantees
//!
//! - **Fan-in**: a [`NodeKind::FanInSink`] is never scheduled while any
//!   non-sink work remains in the frontier, so every upstream sibling has
//!   committed (and its patch is visible) before the sink runs. An empty
//!   fan-out therefore satisfies its fan-in immediately.
//! - **Linearized commits**: patches are merged and snapshotted by the single
//!   drain loop — the per-thread merge lock of the design — so snapshot seqs
//!   are strictly monotonic and each committed task appears in exactly one
//!   snapshot.
//! - **Durability before progress**: every commit awaits the snapshot store
//!   before the next task result is consumed; a crash loses at most the
//!   in-flight node's effect.
//! - **Replay safety**: tasks whose key is already in the committed set are
//!   skipped, so re-driving a thread from its latest snapshot never
//!   double-appends reducer fields.
//! - **Failure semantics**: a permanent handler error cancels the thread's
//!   token, drains outstanding siblings (merging any completions that still
//!   arrive), and records a `Failed` terminal snapshot. There is no partial
//!   completion across a fan-out.
//!
//! Different threads are fully independent; run them concurrently by calling
//! [`Executor::submit`] from separate tasks sharing one executor.

use crate::cancel::{cancel_pair, CancelHandle, CancelToken};
use crate::dispatch::RouteOutcome;
use crate::error::{EngineError, Result};
use crate::events::{EventSink, ExecutionEvent, TracingEventSink};
use crate::graph::{Edge, WorkflowGraph};
use crate::node::{NodeContext, NodeKind, NodeOutput, END};
use crate::state::overlay_view;
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex as StdMutex};
use storyloom_checkpoint::{
    ErrorRecord, PendingTask, RunStatus, Snapshot, SnapshotStore, Suspension,
};
use tokio::sync::Semaphore;
use uuid::Uuid;

/// Default worker pool size when none is configured
pub const DEFAULT_POOL_SIZE: usize = 8;

/// Result of driving a thread until it can go no further
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The thread is suspended awaiting an external decision
    Suspended {
        /// The review payload raised by the suspending handler
        payload: Value,
    },

    /// The thread ran to a terminal (`Completed` or `Cancelled`)
    Terminal {
        status: RunStatus,
        /// Final merged state
        state: Value,
    },

    /// The thread failed permanently
    Failed {
        error: ErrorRecord,
        /// State as of the failure snapshot
        state: Value,
    },
}

/// Drives workflow threads against a graph and a snapshot store
pub struct Executor {
    graph: Arc<WorkflowGraph>,
    store: Arc<dyn SnapshotStore>,
    pool_size: usize,
    resume_deadline: Option<chrono::Duration>,
    sink: Arc<dyn EventSink>,
    cancels: StdMutex<HashMap<String, Arc<CancelHandle>>>,
}

impl Executor {
    /// Create an executor over a graph and snapshot store
    pub fn new(graph: WorkflowGraph, store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            graph: Arc::new(graph),
            store,
            pool_size: DEFAULT_POOL_SIZE,
            resume_deadline: None,
            sink: Arc::new(TracingEventSink),
            cancels: StdMutex::new(HashMap::new()),
        }
    }

    /// Bound the worker pool
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size.max(1);
        self
    }

    /// Set the wall-clock resume deadline recorded on suspensions
    pub fn with_resume_deadline(mut self, deadline: chrono::Duration) -> Self {
        self.resume_deadline = Some(deadline);
        self
    }

    /// Install an event sink
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// The graph this executor runs
    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    /// Request cooperative cancellation of a running thread
    pub fn cancel(&self, thread_id: &str) {
        let cancels = self.cancels.lock().expect("cancel registry poisoned");
        if let Some(handle) = cancels.get(thread_id) {
            handle.cancel();
        }
    }

    /// Start (or continue, after a crash) a thread
    ///
    /// A fresh thread id initializes state and schedules the entry node. A
    /// thread id whose latest snapshot is non-terminal continues from its
    /// stored frontier; `initial_state` is ignored in that case. Submitting a
    /// terminal or suspended thread returns its existing outcome without
    /// executing anything.
    #[tracing::instrument(skip(self, initial_state))]
    pub async fn submit(&self, thread_id: &str, initial_state: Value) -> Result<RunOutcome> {
        self.graph.validate().map_err(EngineError::Validation)?;

        let snapshot = match self.store.latest(thread_id).await? {
            None => {
                let entry = self
                    .graph
                    .entry()
                    .ok_or_else(|| EngineError::Validation("no entry node set".to_string()))?;
                let snapshot =
                    Snapshot::initial(initial_state, vec![PendingTask::new(entry)]);
                self.store.put(thread_id, snapshot.clone()).await?;
                snapshot
            }
            Some(existing) if existing.status.is_terminal() => {
                return Ok(outcome_of(existing));
            }
            Some(existing) if existing.status == RunStatus::AwaitingResume => {
                return Ok(outcome_of(existing));
            }
            Some(existing) => existing,
        };

        self.drive(thread_id, snapshot, None).await
    }

    /// Resume a suspended thread with an external decision value
    ///
    /// Loads the latest snapshot, re-enters only the suspended node's handler
    /// with `decision` as its resume value, and continues scheduling from the
    /// stored frontier. Works across process restarts: everything needed
    /// lives in the snapshot.
    #[tracing::instrument(skip(self, decision))]
    pub async fn resume(&self, thread_id: &str, decision: Value) -> Result<RunOutcome> {
        let mut snapshot = self.store.latest(thread_id).await?.ok_or_else(|| {
            EngineError::InvalidThreadState(format!("unknown thread '{}'", thread_id))
        })?;

        if snapshot.status != RunStatus::AwaitingResume {
            return Err(EngineError::InvalidThreadState(format!(
                "thread '{}' is not suspended",
                thread_id
            )));
        }
        let suspension = snapshot.suspension.take().ok_or_else(|| {
            EngineError::InvalidThreadState(format!(
                "thread '{}' is awaiting resume but has no suspension payload",
                thread_id
            ))
        })?;

        self.graph
            .registry()
            .validate_snapshot(&snapshot)
            .map_err(EngineError::Validation)?;

        self.sink.emit(&ExecutionEvent::Resumed {
            thread_id: thread_id.to_string(),
            node: suspension.node.clone(),
        });

        snapshot.status = RunStatus::Running;
        self.drive(thread_id, snapshot, Some((suspension.node, decision)))
            .await
    }

    /// The round loop. `resume_entry` carries the suspended node and decision
    /// value when this drive is a resumption.
    async fn drive(
        &self,
        thread_id: &str,
        snapshot: Snapshot,
        resume_entry: Option<(String, Value)>,
    ) -> Result<RunOutcome> {
        let (handle, token) = cancel_pair();
        let handle = Arc::new(handle);
        {
            let mut cancels = self.cancels.lock().expect("cancel registry poisoned");
            cancels.insert(thread_id.to_string(), handle.clone());
        }
        let result = self
            .drive_inner(thread_id, snapshot, resume_entry, handle.clone(), token)
            .await;
        {
            let mut cancels = self.cancels.lock().expect("cancel registry poisoned");
            cancels.remove(thread_id);
        }
        result
    }

    async fn drive_inner(
        &self,
        thread_id: &str,
        snapshot: Snapshot,
        resume_entry: Option<(String, Value)>,
        handle: Arc<CancelHandle>,
        token: CancelToken,
    ) -> Result<RunOutcome> {
        let mut state = snapshot.state;
        let mut completed = snapshot.completed;
        let mut frontier = snapshot.frontier;
        let mut seq = snapshot.seq;
        let mut pending_resume = resume_entry;

        loop {
            if token.is_cancelled() {
                return self
                    .finish_cancelled(thread_id, &mut seq, &state, &completed)
                    .await;
            }

            // Pick the batch for this round.
            let (batch, remaining): (Vec<(PendingTask, Option<Value>)>, Vec<PendingTask>) =
                if let Some((node, decision)) = pending_resume.take() {
                    (
                        vec![(PendingTask::new(node), Some(decision))],
                        frontier.clone(),
                    )
                } else {
                    let live: Vec<PendingTask> = frontier
                        .iter()
                        .filter(|t| !completed.contains(&t.key()))
                        .cloned()
                        .collect();
                    if live.is_empty() {
                        break;
                    }
                    let (sinks, work): (Vec<PendingTask>, Vec<PendingTask>) =
                        live.into_iter().partition(|t| {
                            self.graph
                                .registry()
                                .get(&t.node)
                                .map(|spec| spec.kind == NodeKind::FanInSink)
                                .unwrap_or(false)
                        });
                    if work.is_empty() {
                        (sinks.into_iter().map(|t| (t, None)).collect(), Vec::new())
                    } else {
                        (work.into_iter().map(|t| (t, None)).collect(), sinks)
                    }
                };

            let batch_tasks: Vec<PendingTask> = batch.iter().map(|(t, _)| t.clone()).collect();

            // Spawn the batch on the bounded pool.
            let semaphore = Arc::new(Semaphore::new(self.pool_size));
            let mut in_flight = FuturesUnordered::new();
            for (task, resume) in batch {
                let spec = match self.graph.registry().get(&task.node) {
                    Some(spec) => spec.clone(),
                    None => {
                        return Err(EngineError::Validation(format!(
                            "frontier references unknown node '{}'",
                            task.node
                        )))
                    }
                };
                self.sink.emit(&ExecutionEvent::TaskStarted {
                    thread_id: thread_id.to_string(),
                    task: task.key(),
                });
                let view = overlay_view(&state, task.overlay.as_ref())?;
                let ctx = NodeContext {
                    state: view,
                    resume,
                    cancel: token.clone(),
                };
                let semaphore = semaphore.clone();
                in_flight.push(tokio::spawn(async move {
                    let permit = semaphore.acquire_owned().await;
                    let output = match permit {
                        Ok(_permit) => (spec.handler)(ctx).await,
                        Err(_) => Err(EngineError::Execution("worker pool closed".to_string())),
                    };
                    (task, output)
                }));
            }

            // Drain completions: this loop is the per-thread merge lock. Each
            // commit merges the patch, evaluates the node's router against
            // the just-merged state, and snapshots with the accumulated
            // successors so no progress lives only in memory.
            let mut round_error: Option<ErrorRecord> = None;
            let mut round_suspension: Option<Suspension> = None;
            let mut next_tasks: Vec<PendingTask> = Vec::new();

            while let Some(joined) = in_flight.next().await {
                let (task, output) = match joined {
                    Ok(pair) => pair,
                    Err(join_err) => {
                        round_error.get_or_insert_with(|| {
                            ErrorRecord::new(
                                "node_execution",
                                format!("task panicked: {}", join_err),
                            )
                        });
                        handle.cancel();
                        continue;
                    }
                };
                let key = task.key();

                match output {
                    Ok(NodeOutput::Patch(patch)) => {
                        if let Err(state_err) = self.graph.schema().apply(&mut state, &patch) {
                            round_error.get_or_insert_with(|| {
                                ErrorRecord::new("state", state_err.to_string())
                            });
                            handle.cancel();
                            continue;
                        }
                        completed.insert(key.clone());
                        self.route_node(&task.node, &state, &completed, &remaining, &mut next_tasks);
                        seq += 1;

                        let persisted_frontier: Vec<PendingTask> = remaining
                            .iter()
                            .chain(
                                batch_tasks
                                    .iter()
                                    .filter(|t| !completed.contains(&t.key())),
                            )
                            .chain(next_tasks.iter())
                            .cloned()
                            .collect();
                        self.store
                            .put(
                                thread_id,
                                build_snapshot(
                                    seq,
                                    state.clone(),
                                    completed.clone(),
                                    persisted_frontier,
                                    RunStatus::Running,
                                    None,
                                    None,
                                ),
                            )
                            .await?;

                        self.sink.emit(&ExecutionEvent::TaskCompleted {
                            thread_id: thread_id.to_string(),
                            task: key,
                        });
                        self.sink.emit(&ExecutionEvent::SnapshotCommitted {
                            thread_id: thread_id.to_string(),
                            seq,
                        });
                    }
                    Ok(NodeOutput::Suspend(payload)) => {
                        let now = Utc::now();
                        round_suspension = Some(Suspension {
                            node: task.node.clone(),
                            payload,
                            raised_at: now,
                            resume_deadline: self.resume_deadline.map(|d| now + d),
                        });
                    }
                    Err(EngineError::Cancelled) => {
                        // Cooperative unwind, not a failure: the token check
                        // after the drain settles the thread as cancelled.
                        handle.cancel();
                    }
                    Err(err) => {
                        self.sink.emit(&ExecutionEvent::TaskFailed {
                            thread_id: thread_id.to_string(),
                            task: key,
                            error: err.to_string(),
                        });
                        round_error
                            .get_or_insert_with(|| ErrorRecord::new(err.kind(), err.to_string()));
                        handle.cancel();
                    }
                }
            }

            if let Some(error) = round_error {
                seq += 1;
                self.store
                    .put(
                        thread_id,
                        build_snapshot(
                            seq,
                            state.clone(),
                            completed.clone(),
                            Vec::new(),
                            RunStatus::Failed,
                            None,
                            Some(error.clone()),
                        ),
                    )
                    .await?;
                self.sink.emit(&ExecutionEvent::ThreadFinished {
                    thread_id: thread_id.to_string(),
                    status: RunStatus::Failed,
                });
                return Ok(RunOutcome::Failed { error, state });
            }

            if let Some(suspension) = round_suspension {
                // Siblings that committed before the suspension are already
                // snapshotted; anything uncommitted (other than the suspended
                // node itself) stays in the frontier for after resumption.
                let persisted_frontier: Vec<PendingTask> = remaining
                    .iter()
                    .chain(batch_tasks.iter().filter(|t| {
                        !completed.contains(&t.key()) && t.node != suspension.node
                    }))
                    .chain(next_tasks.iter())
                    .cloned()
                    .collect();
                seq += 1;
                let payload = suspension.payload.clone();
                let node = suspension.node.clone();
                self.store
                    .put(
                        thread_id,
                        build_snapshot(
                            seq,
                            state.clone(),
                            completed.clone(),
                            persisted_frontier,
                            RunStatus::AwaitingResume,
                            Some(suspension),
                            None,
                        ),
                    )
                    .await?;
                self.sink.emit(&ExecutionEvent::Suspended {
                    thread_id: thread_id.to_string(),
                    node,
                });
                return Ok(RunOutcome::Suspended { payload });
            }

            if token.is_cancelled() {
                return self
                    .finish_cancelled(thread_id, &mut seq, &state, &completed)
                    .await;
            }

            // Routing already happened per commit; advance the frontier.
            frontier = remaining;
            frontier.extend(next_tasks);
        }

        // Frontier drained: the thread ran to completion.
        seq += 1;
        self.store
            .put(
                thread_id,
                build_snapshot(
                    seq,
                    state.clone(),
                    completed,
                    Vec::new(),
                    RunStatus::Completed,
                    None,
                    None,
                ),
            )
            .await?;
        self.sink.emit(&ExecutionEvent::ThreadFinished {
            thread_id: thread_id.to_string(),
            status: RunStatus::Completed,
        });
        Ok(RunOutcome::Terminal {
            status: RunStatus::Completed,
            state,
        })
    }

    /// Evaluate one committed node's out-edge into `next_tasks`
    fn route_node(
        &self,
        node: &str,
        state: &Value,
        completed: &BTreeSet<String>,
        remaining: &[PendingTask],
        next_tasks: &mut Vec<PendingTask>,
    ) {
        let push_target = |target: &str, next_tasks: &mut Vec<PendingTask>| {
            if target == END
                || completed.contains(target)
                || next_tasks.iter().any(|t| t.key() == target)
                || remaining.iter().any(|t| t.key() == target)
            {
                return;
            }
            next_tasks.push(PendingTask::new(target));
        };

        match self.graph.edge(node) {
            None => {}
            Some(Edge::Direct(to)) => push_target(to, next_tasks),
            Some(Edge::Conditional { router, .. }) => match router(state) {
                RouteOutcome::Next(to) => push_target(&to, next_tasks),
                RouteOutcome::Parallel(targets) => {
                    for to in targets {
                        push_target(&to, next_tasks);
                    }
                }
                RouteOutcome::Dispatch(units) => {
                    for unit in units {
                        let (target, overlay) = unit.into_parts();
                        let index =
                            next_unit_index(&target, completed, remaining, next_tasks);
                        next_tasks.push(PendingTask::unit(target, index, overlay));
                    }
                }
                RouteOutcome::End => {}
            },
        }
    }

    async fn finish_cancelled(
        &self,
        thread_id: &str,
        seq: &mut u64,
        state: &Value,
        completed: &BTreeSet<String>,
    ) -> Result<RunOutcome> {
        *seq += 1;
        self.store
            .put(
                thread_id,
                build_snapshot(
                    *seq,
                    state.clone(),
                    completed.clone(),
                    Vec::new(),
                    RunStatus::Cancelled,
                    None,
                    None,
                ),
            )
            .await?;
        self.sink.emit(&ExecutionEvent::ThreadFinished {
            thread_id: thread_id.to_string(),
            status: RunStatus::Cancelled,
        });
        Ok(RunOutcome::Terminal {
            status: RunStatus::Cancelled,
            state: state.clone(),
        })
    }
}

/// Next free unit index for a fan-out template node
fn next_unit_index(
    node: &str,
    completed: &BTreeSet<String>,
    remaining: &[PendingTask],
    next_tasks: &[PendingTask],
) -> u64 {
    let prefix = format!("{}[", node);
    let committed_units = completed.iter().filter(|k| k.starts_with(&prefix)).count() as u64;
    let queued_units = remaining
        .iter()
        .chain(next_tasks.iter())
        .filter(|t| t.node == node && t.unit.is_some())
        .count() as u64;
    committed_units + queued_units
}

fn build_snapshot(
    seq: u64,
    state: Value,
    completed: BTreeSet<String>,
    frontier: Vec<PendingTask>,
    status: RunStatus,
    suspension: Option<Suspension>,
    error: Option<ErrorRecord>,
) -> Snapshot {
    Snapshot {
        id: Uuid::new_v4().to_string(),
        seq,
        ts: Utc::now(),
        state,
        completed,
        frontier,
        suspension,
        status,
        error,
    }
}

/// Translate an already-settled snapshot into its outcome without executing
fn outcome_of(snapshot: Snapshot) -> RunOutcome {
    match snapshot.status {
        RunStatus::Failed => RunOutcome::Failed {
            error: snapshot
                .error
                .unwrap_or_else(|| ErrorRecord::new("unknown", "failed without error record")),
            state: snapshot.state,
        },
        RunStatus::AwaitingResume => RunOutcome::Suspended {
            payload: snapshot
                .suspension
                .map(|s| s.payload)
                .unwrap_or(Value::Null),
        },
        status => RunOutcome::Terminal {
            status,
            state: snapshot.state,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeKind, NodeSpec};
    use crate::state::{AppendReducer, StateSchema};
    use serde_json::json;
    use storyloom_checkpoint::InMemorySnapshotStore;

    fn patch_node(name: &str, patch: Value) -> NodeSpec {
        NodeSpec::new(name, NodeKind::Linear, move |_ctx| {
            let patch = patch.clone();
            Box::pin(async move { Ok(NodeOutput::Patch(patch)) })
        })
    }

    #[tokio::test]
    async fn test_linear_flow_runs_to_completion() {
        let mut graph = WorkflowGraph::new(StateSchema::new());
        graph.add_node(patch_node("first", json!({"a": 1})));
        graph.add_node(patch_node("second", json!({"b": 2})));
        graph.set_entry("first");
        graph.add_edge("first", "second");
        graph.add_edge("second", END);

        let store = Arc::new(InMemorySnapshotStore::new());
        let executor = Executor::new(graph, store.clone());

        let outcome = executor.submit("t1", json!({})).await.unwrap();
        let RunOutcome::Terminal { status, state } = outcome else {
            panic!("expected terminal outcome");
        };
        assert_eq!(status, RunStatus::Completed);
        assert_eq!(state["a"], json!(1));
        assert_eq!(state["b"], json!(2));
    }

    #[tokio::test]
    async fn test_snapshot_seqs_strictly_monotonic() {
        let mut graph = WorkflowGraph::new(StateSchema::new());
        graph.add_node(patch_node("only", json!({"x": 1})));
        graph.set_entry("only");
        graph.add_edge("only", END);

        let store = Arc::new(InMemorySnapshotStore::new());
        let executor = Executor::new(graph, store.clone());
        executor.submit("t1", json!({})).await.unwrap();

        let history = store.history("t1").await.unwrap();
        let seqs: Vec<u64> = history.iter().map(|s| s.seq).collect();
        let mut sorted = seqs.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(seqs, sorted, "seqs must be strictly increasing: {:?}", seqs);
    }

    #[tokio::test]
    async fn test_reducer_contributions_from_parallel_nodes() {
        let mut schema = StateSchema::new();
        schema.add_field("items", Box::new(AppendReducer));

        let mut graph = WorkflowGraph::new(schema);
        graph.add_node(patch_node("split", json!({})));
        graph.add_node(patch_node("left", json!({"items": [{"index": 0}]})));
        graph.add_node(patch_node("right", json!({"items": [{"index": 1}]})));
        graph.add_node(NodeSpec::new("join", NodeKind::FanInSink, |_ctx| {
            Box::pin(async move { Ok(NodeOutput::Patch(json!({}))) })
        }));
        graph.set_entry("split");
        graph.add_conditional_edge(
            "split",
            Arc::new(|_| RouteOutcome::Parallel(vec!["left".to_string(), "right".to_string()])),
            vec!["left".to_string(), "right".to_string()],
        );
        graph.add_edge("left", "join");
        graph.add_edge("right", "join");
        graph.add_edge("join", END);

        let store = Arc::new(InMemorySnapshotStore::new());
        let executor = Executor::new(graph, store);
        let outcome = executor.submit("t1", json!({})).await.unwrap();

        let RunOutcome::Terminal { state, .. } = outcome else {
            panic!("expected terminal outcome");
        };
        let mut indices: Vec<u64> = state["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["index"].as_u64().unwrap())
            .collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_permanent_error_fails_thread() {
        let mut graph = WorkflowGraph::new(StateSchema::new());
        graph.add_node(NodeSpec::new("boom", NodeKind::Linear, |_ctx| {
            Box::pin(async move {
                Err(EngineError::permanent("media_guardrail_exhausted", "still flagged"))
            })
        }));
        graph.set_entry("boom");
        graph.add_edge("boom", END);

        let store = Arc::new(InMemorySnapshotStore::new());
        let executor = Executor::new(graph, store.clone());
        let outcome = executor.submit("t1", json!({})).await.unwrap();

        let RunOutcome::Failed { error, .. } = outcome else {
            panic!("expected failed outcome");
        };
        assert_eq!(error.kind, "media_guardrail_exhausted");

        let latest = store.latest("t1").await.unwrap().unwrap();
        assert_eq!(latest.status, RunStatus::Failed);
        assert_eq!(latest.error.unwrap().kind, "media_guardrail_exhausted");
    }

    #[tokio::test]
    async fn test_submit_terminal_thread_is_idempotent() {
        let mut graph = WorkflowGraph::new(StateSchema::new());
        graph.add_node(patch_node("only", json!({"x": 1})));
        graph.set_entry("only");
        graph.add_edge("only", END);

        let store = Arc::new(InMemorySnapshotStore::new());
        let executor = Executor::new(graph, store.clone());
        executor.submit("t1", json!({})).await.unwrap();
        let count_after_first = store.snapshot_count().await;

        let outcome = executor.submit("t1", json!({})).await.unwrap();
        assert!(matches!(
            outcome,
            RunOutcome::Terminal {
                status: RunStatus::Completed,
                ..
            }
        ));
        assert_eq!(store.snapshot_count().await, count_after_first);
    }

    #[tokio::test]
    async fn test_resume_on_non_suspended_thread_errors() {
        let mut graph = WorkflowGraph::new(StateSchema::new());
        graph.add_node(patch_node("only", json!({})));
        graph.set_entry("only");
        graph.add_edge("only", END);

        let store = Arc::new(InMemorySnapshotStore::new());
        let executor = Executor::new(graph, store);
        executor.submit("t1", json!({})).await.unwrap();

        let err = executor.resume("t1", json!({})).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidThreadState(_)));
    }
}
