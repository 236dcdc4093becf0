//! Per-node structured execution events
//!
//! The executor emits one [`ExecutionEvent`] for every task start, task
//! completion, snapshot commit, suspension, and thread finish, all correlated
//! by thread id. Events go to a pluggable [`EventSink`]; the default
//! [`TracingEventSink`] forwards them to `tracing`, so an application that
//! installs a subscriber gets structured per-node logs for free, while tests
//! install a recording sink and assert on the sequence.

use std::sync::Mutex;
use storyloom_checkpoint::RunStatus;

/// A structured event describing one step of thread execution
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    /// A task (node invocation or dispatch unit) began executing
    TaskStarted {
        thread_id: String,
        task: String,
    },
    /// A task committed its patch
    TaskCompleted {
        thread_id: String,
        task: String,
    },
    /// A task failed
    TaskFailed {
        thread_id: String,
        task: String,
        error: String,
    },
    /// A snapshot was durably committed
    SnapshotCommitted {
        thread_id: String,
        seq: u64,
    },
    /// The thread suspended awaiting an external decision
    Suspended {
        thread_id: String,
        node: String,
    },
    /// The thread resumed from a suspension
    Resumed {
        thread_id: String,
        node: String,
    },
    /// The thread reached a final status
    ThreadFinished {
        thread_id: String,
        status: RunStatus,
    },
}

/// Receiver for execution events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &ExecutionEvent);
}

/// Default sink: forwards events to `tracing`
#[derive(Debug, Clone, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::TaskStarted { thread_id, task } => {
                tracing::debug!(%thread_id, %task, "task started");
            }
            ExecutionEvent::TaskCompleted { thread_id, task } => {
                tracing::debug!(%thread_id, %task, "task completed");
            }
            ExecutionEvent::TaskFailed {
                thread_id,
                task,
                error,
            } => {
                tracing::warn!(%thread_id, %task, %error, "task failed");
            }
            ExecutionEvent::SnapshotCommitted { thread_id, seq } => {
                tracing::trace!(%thread_id, seq, "snapshot committed");
            }
            ExecutionEvent::Suspended { thread_id, node } => {
                tracing::info!(%thread_id, %node, "thread suspended");
            }
            ExecutionEvent::Resumed { thread_id, node } => {
                tracing::info!(%thread_id, %node, "thread resumed");
            }
            ExecutionEvent::ThreadFinished { thread_id, status } => {
                tracing::info!(%thread_id, ?status, "thread finished");
            }
        }
    }
}

/// Sink that records every event; for tests
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<ExecutionEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events emitted so far
    pub fn events(&self) -> Vec<ExecutionEvent> {
        self.events.lock().expect("event sink poisoned").clone()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: &ExecutionEvent) {
        self.events
            .lock()
            .expect("event sink poisoned")
            .push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_captures_in_order() {
        let sink = RecordingEventSink::new();
        sink.emit(&ExecutionEvent::TaskStarted {
            thread_id: "t".to_string(),
            task: "a".to_string(),
        });
        sink.emit(&ExecutionEvent::SnapshotCommitted {
            thread_id: "t".to_string(),
            seq: 1,
        });

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], ExecutionEvent::TaskStarted { task, .. } if task == "a"));
        assert!(matches!(&events[1], ExecutionEvent::SnapshotCommitted { seq: 1, .. }));
    }
}
