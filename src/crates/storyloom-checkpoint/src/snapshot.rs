//! Core snapshot data structures for durable workflow state
//!
//! A [`Snapshot`] is the unit of persistence for a workflow thread: the merged
//! state at a point in time, the set of committed task keys, the pending
//! frontier, and — when the thread is paused for human review — the
//! [`Suspension`] payload. Snapshots are written after every committed node
//! patch, so a crash loses at most the effect of the node that was in flight.
//!
//! # Structure
//!
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │  Snapshot (thread "job-42", seq 7)             │
//! │  • state: { "story_text": ..., ... }           │
//! │  • completed: {"input_moderator",              │
//! │               "story_writer",                  │
//! │               "generate_single_image[0]", ...} │
//! │  • frontier: [PendingTask{"assembler"}]        │
//! │  • suspension: None                            │
//! │  • status: Running                             │
//! └────────────────────────────────────────────────┘
//! ```
//!
//! Within a thread, `seq` is strictly monotonic and the store keeps the full
//! ordered history; `latest` always returns the highest committed snapshot.
//! All types serialize with serde so any backend can persist them as opaque
//! blobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Thread identifier — one workflow run, 1:1 with a user-visible job
pub type ThreadId = String;

/// Execution status of a thread, as recorded in its latest snapshot
///
/// Engine-level status; the workflow's own job status (completed, rejected,
/// and so on) lives in the state blob and is set by terminal nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Thread is executing nodes
    Running,
    /// Thread is suspended awaiting an external decision
    AwaitingResume,
    /// Thread finished through a terminal node
    Completed,
    /// Thread failed with a permanent error
    Failed,
    /// Thread was cancelled cooperatively
    Cancelled,
}

impl RunStatus {
    /// Whether this status is terminal (no further scheduling)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }
}

/// A scheduled-but-not-yet-committed task, persisted so scheduling resumes
/// from the exact point after a restart
///
/// A linear node is identified by its name alone; a fan-out dispatch unit
/// additionally carries its unit index and the overlay the router attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTask {
    /// Target node name
    pub node: String,

    /// Fan-out unit index, if this task came from a dynamic dispatch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<u64>,

    /// Overlay state merged over the canonical state for this invocation only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlay: Option<serde_json::Value>,
}

impl PendingTask {
    /// Create a task for a linear node invocation
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            unit: None,
            overlay: None,
        }
    }

    /// Create a task for one dispatch unit of a fan-out
    pub fn unit(node: impl Into<String>, unit: u64, overlay: serde_json::Value) -> Self {
        Self {
            node: node.into(),
            unit: Some(unit),
            overlay: Some(overlay),
        }
    }

    /// Stable key identifying this task in the completed set
    pub fn key(&self) -> String {
        match self.unit {
            Some(i) => format!("{}[{}]", self.node, i),
            None => self.node.clone(),
        }
    }
}

/// A pending suspension: the thread is paused inside `node` until an external
/// decision arrives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suspension {
    /// Node whose handler raised the suspension; re-entered on resume
    pub node: String,

    /// Serializable payload handed to the external reviewer
    pub payload: serde_json::Value,

    /// When the suspension was raised
    pub raised_at: DateTime<Utc>,

    /// Wall-clock deadline after which the sweeper resumes with a timeout
    /// rejection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_deadline: Option<DateTime<Utc>>,
}

/// Error captured in a failed thread's terminal snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Machine-readable error kind, e.g. `media_guardrail_exhausted`
    pub kind: String,

    /// Human-readable detail
    pub detail: String,
}

impl ErrorRecord {
    pub fn new(kind: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            detail: detail.into(),
        }
    }
}

/// Durable record of a thread's state at one sequence number
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Unique snapshot id
    pub id: String,

    /// Monotonic sequence number within the thread
    pub seq: u64,

    /// When this snapshot was committed
    pub ts: DateTime<Utc>,

    /// The merged workflow state
    pub state: serde_json::Value,

    /// Keys of every task that has committed its patch (see
    /// [`PendingTask::key`])
    pub completed: BTreeSet<String>,

    /// Tasks scheduled but not yet committed
    pub frontier: Vec<PendingTask>,

    /// Pending suspension, if the thread is awaiting an external decision
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspension: Option<Suspension>,

    /// Engine-level run status
    pub status: RunStatus,

    /// Error detail for failed threads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
}

impl Snapshot {
    /// Create the initial snapshot for a fresh thread
    pub fn initial(state: serde_json::Value, frontier: Vec<PendingTask>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            seq: 0,
            ts: Utc::now(),
            state,
            completed: BTreeSet::new(),
            frontier,
            suspension: None,
            status: RunStatus::Running,
            error: None,
        }
    }

    /// Derive the successor snapshot: next seq, fresh id and timestamp,
    /// everything else carried over
    pub fn next(&self) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            seq: self.seq + 1,
            ts: Utc::now(),
            state: self.state.clone(),
            completed: self.completed.clone(),
            frontier: self.frontier.clone(),
            suspension: self.suspension.clone(),
            status: self.status,
            error: self.error.clone(),
        }
    }

    /// Set the run status
    pub fn with_status(mut self, status: RunStatus) -> Self {
        self.status = status;
        self
    }

    /// Attach a suspension
    pub fn with_suspension(mut self, suspension: Suspension) -> Self {
        self.suspension = Some(suspension);
        self
    }

    /// Attach an error record
    pub fn with_error(mut self, error: ErrorRecord) -> Self {
        self.error = Some(error);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pending_task_keys() {
        assert_eq!(PendingTask::new("assembler").key(), "assembler");
        assert_eq!(
            PendingTask::unit("generate_single_image", 2, json!({"_index": 2})).key(),
            "generate_single_image[2]"
        );
    }

    #[test]
    fn test_initial_snapshot() {
        let snap = Snapshot::initial(json!({"prompt": "hi"}), vec![PendingTask::new("entry")]);
        assert_eq!(snap.seq, 0);
        assert_eq!(snap.status, RunStatus::Running);
        assert!(snap.completed.is_empty());
        assert!(snap.suspension.is_none());
    }

    #[test]
    fn test_next_increments_seq() {
        let first = Snapshot::initial(json!({}), vec![]);
        let second = first.next();
        assert_eq!(second.seq, 1);
        assert_ne!(second.id, first.id);
        assert_eq!(second.status, first.status);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(!RunStatus::AwaitingResume.is_terminal());
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let snap = Snapshot::initial(json!({"k": 1}), vec![PendingTask::new("n")])
            .with_status(RunStatus::AwaitingResume)
            .with_suspension(Suspension {
                node: "human_review_gate".to_string(),
                payload: json!({"story_title": "t"}),
                raised_at: Utc::now(),
                resume_deadline: None,
            });

        let encoded = serde_json::to_string(&snap).unwrap();
        let decoded: Snapshot = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.seq, snap.seq);
        assert_eq!(decoded.status, RunStatus::AwaitingResume);
        assert_eq!(decoded.suspension.unwrap().node, "human_review_gate");
    }
}
