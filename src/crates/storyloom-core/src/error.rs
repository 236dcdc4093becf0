//! Error types and error handling for engine operations
//!
//! All errors implement `std::error::Error` via `thiserror`. The important
//! distinction for callers is between *permanent* errors — which
//! short-circuit the thread into the `Failed` terminal with the error
//! captured in the snapshot — and everything else, which indicates a
//! programming or infrastructure problem surfaced to the submitter.
//!
//! Transient failures never reach this enum: provider adapters retry them
//! internally and convert exhaustion into [`EngineError::Permanent`].
//!
//! # Matching specific errors
//!
//! ```rust
//! use storyloom_core::error::EngineError;
//!
//! fn handle(err: EngineError) {
//!     match err {
//!         EngineError::Validation(msg) => eprintln!("graph invalid: {}", msg),
//!         EngineError::Permanent { kind, detail } => {
//!             eprintln!("thread failed permanently ({}): {}", kind, detail);
//!         }
//!         EngineError::NodeExecution { node, error } => {
//!             eprintln!("node '{}' failed: {}", node, error);
//!         }
//!         other => eprintln!("{}", other),
//!     }
//! }
//! ```

use storyloom_checkpoint::CheckpointError;
use thiserror::Error;

use crate::state::StateError;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur during graph construction and execution
#[derive(Error, Debug)]
pub enum EngineError {
    /// Graph structure validation failed (missing node, bad edge target,
    /// unknown entry point)
    #[error("Graph validation failed: {0}")]
    Validation(String),

    /// A node's handler returned an error that is not a tagged permanent
    /// failure
    #[error("Node '{node}' execution failed: {error}")]
    NodeExecution {
        /// Name of the node that failed
        node: String,
        /// Error message from node execution
        error: String,
    },

    /// General execution error without node context
    #[error("Execution failed: {0}")]
    Execution(String),

    /// A permanent failure raised by a handler; terminates the thread
    /// through the `Failed` path with `kind` recorded in the snapshot
    #[error("Permanent failure ({kind}): {detail}")]
    Permanent {
        /// Machine-readable kind, e.g. `media_guardrail_exhausted`
        kind: String,
        /// Human-readable detail
        detail: String,
    },

    /// The thread is not in a state that permits the requested operation
    /// (e.g. `resume` on a thread that is not suspended)
    #[error("Invalid thread state: {0}")]
    InvalidThreadState(String),

    /// Snapshot persistence failed
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// State merge failed
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// The thread was cancelled
    #[error("Cancelled")]
    Cancelled,
}

impl EngineError {
    /// Create a node execution error
    pub fn node_execution(node: impl Into<String>, error: impl Into<String>) -> Self {
        EngineError::NodeExecution {
            node: node.into(),
            error: error.into(),
        }
    }

    /// Create a tagged permanent failure
    pub fn permanent(kind: impl Into<String>, detail: impl Into<String>) -> Self {
        EngineError::Permanent {
            kind: kind.into(),
            detail: detail.into(),
        }
    }

    /// The machine-readable kind recorded in a failed thread's snapshot
    pub fn kind(&self) -> &str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::NodeExecution { .. } => "node_execution",
            EngineError::Execution(_) => "execution",
            EngineError::Permanent { kind, .. } => kind,
            EngineError::InvalidThreadState(_) => "invalid_thread_state",
            EngineError::Checkpoint(_) => "checkpoint",
            EngineError::State(_) => "state",
            EngineError::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permanent_kind() {
        let err = EngineError::permanent("media_guardrail_exhausted", "weapon still detected");
        assert_eq!(err.kind(), "media_guardrail_exhausted");
        assert!(err.to_string().contains("weapon still detected"));
    }

    #[test]
    fn test_node_execution_display() {
        let err = EngineError::node_execution("story_writer", "model unavailable");
        assert_eq!(
            err.to_string(),
            "Node 'story_writer' execution failed: model unavailable"
        );
    }
}
