//! Node definitions and the node registry
//!
//! A node is a named handler plus a declared concurrency kind. Handlers are
//! pure with respect to state: they receive an immutable view (canonical
//! state overlaid with their dispatch overlay) and return a patch — or a
//! [`NodeOutput::Suspend`] carrying a review payload, which is the engine's
//! single human-in-the-loop primitive.
//!
//! The [`NodeRegistry`] is immutable per engine version and doubles as the
//! schema against which checkpoints are validated on resume: a snapshot that
//! references a node the registry no longer knows cannot be replayed.
//!
//! # Writing a handler
//!
//! ```rust
//! use storyloom_core::node::{NodeContext, NodeOutput, NodeSpec, NodeKind};
//! use serde_json::json;
//!
//! let spec = NodeSpec::new("story_writer", NodeKind::Linear, |ctx: NodeContext| {
//!     Box::pin(async move {
//!         let prompt = ctx.state["prompt"].as_str().unwrap_or_default().to_string();
//!         // ... call a provider port through a captured Arc ...
//!         Ok(NodeOutput::Patch(json!({"story_text": format!("Once upon: {}", prompt)})))
//!     })
//! });
//! assert_eq!(spec.name, "story_writer");
//! ```

use crate::cancel::CancelToken;
use crate::error::Result;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use storyloom_checkpoint::Snapshot;

/// Node identifier — unique name within a graph
pub type NodeId = String;

/// Special node identifier marking thread termination
pub const END: &str = "__end__";

/// Declared concurrency kind of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// One in, one out: contributes one patch per invocation
    Linear,

    /// Its router emits dispatch units; the node itself still runs once to
    /// produce the list the router reads
    FanOutSource,

    /// Scheduled only after every upstream task has committed; receives the
    /// fully merged state
    FanInSink,
}

/// What a handler returns
#[derive(Debug, Clone)]
pub enum NodeOutput {
    /// A patch to merge into canonical state
    Patch(Value),

    /// Halt the thread pending an external decision; the payload is recorded
    /// in the snapshot and handed to the caller
    Suspend(Value),
}

impl From<Value> for NodeOutput {
    fn from(patch: Value) -> Self {
        NodeOutput::Patch(patch)
    }
}

/// Everything a handler invocation sees
#[derive(Debug, Clone)]
pub struct NodeContext {
    /// Canonical state overlaid with this invocation's dispatch overlay
    pub state: Value,

    /// The decision value, when this invocation is the re-entry of a
    /// suspended node
    pub resume: Option<Value>,

    /// Cooperative cancellation token for this thread
    pub cancel: CancelToken,
}

/// Async handler: context in, patch (or suspension) out
pub type NodeHandler =
    Arc<dyn Fn(NodeContext) -> BoxFuture<'static, Result<NodeOutput>> + Send + Sync>;

/// A registered node
#[derive(Clone)]
pub struct NodeSpec {
    /// Unique node name
    pub name: NodeId,

    /// Declared concurrency kind
    pub kind: NodeKind,

    /// The handler
    pub handler: NodeHandler,
}

impl NodeSpec {
    /// Create a node spec from a handler closure
    pub fn new<F>(name: impl Into<NodeId>, kind: NodeKind, handler: F) -> Self
    where
        F: Fn(NodeContext) -> BoxFuture<'static, Result<NodeOutput>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind,
            handler: Arc::new(handler),
        }
    }
}

impl fmt::Debug for NodeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeSpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("handler", &"<function>")
            .finish()
    }
}

/// Immutable map of node name → spec
#[derive(Debug, Default, Clone)]
pub struct NodeRegistry {
    nodes: HashMap<NodeId, NodeSpec>,
}

impl NodeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node; replaces any existing node with the same name
    pub fn register(&mut self, spec: NodeSpec) {
        self.nodes.insert(spec.name.clone(), spec);
    }

    /// Look up a node by name
    pub fn get(&self, name: &str) -> Option<&NodeSpec> {
        self.nodes.get(name)
    }

    /// Whether the registry knows this node
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Registered node names
    pub fn names(&self) -> Vec<NodeId> {
        self.nodes.keys().cloned().collect()
    }

    /// Validate a snapshot against this registry before resuming from it
    ///
    /// Every completed task key, frontier task, and pending suspension must
    /// reference a registered node; otherwise the checkpoint belongs to a
    /// different engine version and cannot be replayed.
    pub fn validate_snapshot(&self, snapshot: &Snapshot) -> std::result::Result<(), String> {
        for key in &snapshot.completed {
            let node = key.split('[').next().unwrap_or(key.as_str());
            if !self.contains(node) {
                return Err(format!("snapshot references unknown node '{}'", node));
            }
        }
        for task in &snapshot.frontier {
            if !self.contains(&task.node) {
                return Err(format!(
                    "snapshot frontier references unknown node '{}'",
                    task.node
                ));
            }
        }
        if let Some(suspension) = &snapshot.suspension {
            if !self.contains(&suspension.node) {
                return Err(format!(
                    "snapshot suspension references unknown node '{}'",
                    suspension.node
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use storyloom_checkpoint::PendingTask;

    fn noop_spec(name: &str, kind: NodeKind) -> NodeSpec {
        NodeSpec::new(name, kind, |_ctx| {
            Box::pin(async move { Ok(NodeOutput::Patch(json!({}))) })
        })
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = NodeRegistry::new();
        registry.register(noop_spec("a", NodeKind::Linear));
        registry.register(noop_spec("b", NodeKind::FanInSink));

        assert!(registry.contains("a"));
        assert_eq!(registry.get("b").unwrap().kind, NodeKind::FanInSink);
        assert!(registry.get("c").is_none());
    }

    #[test]
    fn test_validate_snapshot_accepts_known_nodes() {
        let mut registry = NodeRegistry::new();
        registry.register(noop_spec("writer", NodeKind::Linear));
        registry.register(noop_spec("gen", NodeKind::Linear));

        let mut snapshot = Snapshot::initial(json!({}), vec![PendingTask::new("writer")]);
        snapshot.completed.insert("gen[0]".to_string());

        assert!(registry.validate_snapshot(&snapshot).is_ok());
    }

    #[test]
    fn test_validate_snapshot_rejects_unknown_completed() {
        let registry = NodeRegistry::new();
        let mut snapshot = Snapshot::initial(json!({}), vec![]);
        snapshot.completed.insert("ghost".to_string());

        let err = registry.validate_snapshot(&snapshot).unwrap_err();
        assert!(err.contains("ghost"));
    }

    #[tokio::test]
    async fn test_handler_runs() {
        let spec = noop_spec("n", NodeKind::Linear);
        let (_handle, token) = crate::cancel::cancel_pair();
        let ctx = NodeContext {
            state: json!({"x": 1}),
            resume: None,
            cancel: token,
        };

        let output = (spec.handler)(ctx).await.unwrap();
        assert!(matches!(output, NodeOutput::Patch(_)));
    }
}
