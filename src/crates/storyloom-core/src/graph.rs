//! Workflow graph: nodes, edges, routers, and the state schema
//!
//! A [`WorkflowGraph`] binds a [`NodeRegistry`] to the edges that connect its
//! nodes and the [`StateSchema`] that governs patch merging. Topology is
//! static per engine version; only routers read state at runtime.
//!
//! Each node has at most one out-edge:
//!
//! - [`Edge::Direct`] — unconditional transition to a named successor (or
//!   [`END`]).
//! - [`Edge::Conditional`] — a deterministic router closure returning a
//!   [`RouteOutcome`]: a single successor, a parallel set, or a list of
//!   dispatch units for fan-out. `branches` lists every node the router may
//!   name, for validation.
//!
//! # Example
//!
//! ```rust
//! use storyloom_core::graph::WorkflowGraph;
//! use storyloom_core::node::{NodeKind, NodeOutput, NodeSpec, END};
//! use storyloom_core::dispatch::RouteOutcome;
//! use storyloom_core::state::StateSchema;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let mut graph = WorkflowGraph::new(StateSchema::new());
//! graph.add_node(NodeSpec::new("check", NodeKind::Linear, |_ctx| {
//!     Box::pin(async move { Ok(NodeOutput::Patch(json!({"flagged": false}))) })
//! }));
//! graph.add_node(NodeSpec::new("write", NodeKind::Linear, |_ctx| {
//!     Box::pin(async move { Ok(NodeOutput::Patch(json!({}))) })
//! }));
//!
//! graph.set_entry("check");
//! graph.add_conditional_edge(
//!     "check",
//!     Arc::new(|state| {
//!         if state["flagged"].as_bool().unwrap_or(false) {
//!             RouteOutcome::End
//!         } else {
//!             RouteOutcome::Next("write".to_string())
//!         }
//!     }),
//!     vec!["write".to_string()],
//! );
//! graph.add_edge("write", END);
//!
//! assert!(graph.validate().is_ok());
//! ```

use crate::dispatch::RouteOutcome;
use crate::node::{NodeId, NodeRegistry, NodeSpec, END};
use crate::state::StateSchema;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Router closure: reads state, decides what runs next
///
/// Must be deterministic given state and free of side effects.
pub type Router = Arc<dyn Fn(&Value) -> RouteOutcome + Send + Sync>;

/// Out-edge of a node
#[derive(Clone)]
pub enum Edge {
    /// Unconditional transition
    Direct(NodeId),

    /// Dynamic routing through a router closure
    Conditional {
        router: Router,
        /// Every node the router may return, for validation
        branches: Vec<NodeId>,
    },
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Direct(to) => f.debug_tuple("Direct").field(to).finish(),
            Edge::Conditional { branches, .. } => f
                .debug_struct("Conditional")
                .field("router", &"<function>")
                .field("branches", branches)
                .finish(),
        }
    }
}

/// The complete, validated workflow definition the executor runs
pub struct WorkflowGraph {
    registry: NodeRegistry,
    edges: HashMap<NodeId, Edge>,
    entry: Option<NodeId>,
    schema: StateSchema,
}

impl WorkflowGraph {
    /// Create an empty graph with the given state schema
    pub fn new(schema: StateSchema) -> Self {
        Self {
            registry: NodeRegistry::new(),
            edges: HashMap::new(),
            entry: None,
            schema,
        }
    }

    /// Register a node
    pub fn add_node(&mut self, spec: NodeSpec) {
        self.registry.register(spec);
    }

    /// Add a direct edge `from -> to` (`to` may be [`END`])
    pub fn add_edge(&mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) {
        self.edges.insert(from.into(), Edge::Direct(to.into()));
    }

    /// Add a conditional edge with a router and its possible branch targets
    pub fn add_conditional_edge(
        &mut self,
        from: impl Into<NodeId>,
        router: Router,
        branches: Vec<NodeId>,
    ) {
        self.edges
            .insert(from.into(), Edge::Conditional { router, branches });
    }

    /// Set the entry node
    pub fn set_entry(&mut self, node: impl Into<NodeId>) {
        self.entry = Some(node.into());
    }

    /// Entry node name
    pub fn entry(&self) -> Option<&str> {
        self.entry.as_deref()
    }

    /// The node registry
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Out-edge of a node, if any
    pub fn edge(&self, node: &str) -> Option<&Edge> {
        self.edges.get(node)
    }

    /// The state schema
    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    /// Validate the graph structure
    ///
    /// Checks that the entry node exists, that every edge source is a
    /// registered node, and that every direct target and declared branch
    /// target is registered or [`END`].
    pub fn validate(&self) -> Result<(), String> {
        let entry = self
            .entry
            .as_ref()
            .ok_or_else(|| "no entry node set".to_string())?;
        if !self.registry.contains(entry) {
            return Err(format!("entry node '{}' does not exist", entry));
        }

        for (from, edge) in &self.edges {
            if !self.registry.contains(from) {
                return Err(format!("edge source '{}' does not exist", from));
            }
            match edge {
                Edge::Direct(to) => {
                    if to != END && !self.registry.contains(to) {
                        return Err(format!("edge target '{}' does not exist", to));
                    }
                }
                Edge::Conditional { branches, .. } => {
                    for to in branches {
                        if to != END && !self.registry.contains(to) {
                            return Err(format!("branch target '{}' does not exist", to));
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

impl fmt::Debug for WorkflowGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowGraph")
            .field("entry", &self.entry)
            .field("nodes", &self.registry.names())
            .field("edges", &self.edges)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeKind, NodeOutput};
    use serde_json::json;

    fn noop(name: &str) -> NodeSpec {
        NodeSpec::new(name, NodeKind::Linear, |_ctx| {
            Box::pin(async move { Ok(NodeOutput::Patch(json!({}))) })
        })
    }

    #[test]
    fn test_validate_ok() {
        let mut graph = WorkflowGraph::new(StateSchema::new());
        graph.add_node(noop("a"));
        graph.add_node(noop("b"));
        graph.set_entry("a");
        graph.add_edge("a", "b");
        graph.add_edge("b", END);

        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_validate_missing_entry() {
        let graph = WorkflowGraph::new(StateSchema::new());
        assert!(graph.validate().is_err());
    }

    #[test]
    fn test_validate_unknown_edge_target() {
        let mut graph = WorkflowGraph::new(StateSchema::new());
        graph.add_node(noop("a"));
        graph.set_entry("a");
        graph.add_edge("a", "missing");

        let err = graph.validate().unwrap_err();
        assert!(err.contains("missing"));
    }

    #[test]
    fn test_validate_unknown_branch_target() {
        let mut graph = WorkflowGraph::new(StateSchema::new());
        graph.add_node(noop("a"));
        graph.set_entry("a");
        graph.add_conditional_edge(
            "a",
            Arc::new(|_| RouteOutcome::End),
            vec!["ghost".to_string()],
        );

        let err = graph.validate().unwrap_err();
        assert!(err.contains("ghost"));
    }

    #[test]
    fn test_router_reads_state() {
        let mut graph = WorkflowGraph::new(StateSchema::new());
        graph.add_node(noop("a"));
        graph.add_node(noop("yes"));
        graph.add_node(noop("no"));
        graph.set_entry("a");
        graph.add_conditional_edge(
            "a",
            Arc::new(|state| {
                if state["ok"].as_bool().unwrap_or(false) {
                    "yes".into()
                } else {
                    "no".into()
                }
            }),
            vec!["yes".to_string(), "no".to_string()],
        );

        let Edge::Conditional { router, .. } = graph.edge("a").unwrap() else {
            panic!("expected conditional edge");
        };
        assert!(matches!(router(&json!({"ok": true})), RouteOutcome::Next(n) if n == "yes"));
        assert!(matches!(router(&json!({"ok": false})), RouteOutcome::Next(n) if n == "no"));
    }
}
