//! Dynamic dispatch units and routing outcomes
//!
//! Routers run after each node and decide what the executor schedules next.
//! A static router names one successor (or a parallel set of successors); a
//! dynamic router returns a list of [`DispatchUnit`]s — one invocation of a
//! fan-out template node per element of some state list, each carrying its
//! own overlay.
//!
//! ```text
//!   image_prompter ──router──► [ DispatchUnit("generate_single_image",
//!                                  {"_index": 0, "_prompt": "a mouse ..."}),
//!                                DispatchUnit("generate_single_image",
//!                                  {"_index": 1, "_prompt": "cheese ..."}) ]
//!                                      │              │
//!                                      ▼              ▼
//!                               unit 0 runs      unit 1 runs
//!                                      └──────┬───────┘
//!                                             ▼
//!                                         assembler (fan-in)
//! ```
//!
//! Routers must be deterministic given state and free of side effects: the
//! executor may re-evaluate them when reconstructing a frontier after a
//! restart.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One target invocation emitted by a router for fan-out
///
/// The executor runs the target node with the current merged state overlaid
/// with `overlay`; the overlay's `_`-prefixed fields are visible only to that
/// invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchUnit {
    node: NodeId,
    overlay: Value,
}

impl DispatchUnit {
    /// Create a dispatch unit targeting `node` with the given overlay
    pub fn new(node: impl Into<NodeId>, overlay: Value) -> Self {
        Self {
            node: node.into(),
            overlay,
        }
    }

    /// Target node name
    pub fn node(&self) -> &str {
        &self.node
    }

    /// Overlay state for this invocation
    pub fn overlay(&self) -> &Value {
        &self.overlay
    }

    /// Consume the unit and return its parts
    pub fn into_parts(self) -> (NodeId, Value) {
        (self.node, self.overlay)
    }
}

/// What a router tells the executor to schedule next
#[derive(Debug, Clone)]
pub enum RouteOutcome {
    /// Route to a single node
    Next(NodeId),

    /// Execute several nodes in parallel, all with the canonical state
    Parallel(Vec<NodeId>),

    /// Execute one invocation per dispatch unit, each with its own overlay
    ///
    /// An empty list is a legal outcome of an empty fan-out; the router is
    /// expected to route to the join node instead when it has nothing to
    /// dispatch, so an empty fan-in is satisfied immediately.
    Dispatch(Vec<DispatchUnit>),

    /// The thread terminates along this edge
    End,
}

impl From<&str> for RouteOutcome {
    fn from(node: &str) -> Self {
        RouteOutcome::Next(node.to_string())
    }
}

impl From<String> for RouteOutcome {
    fn from(node: String) -> Self {
        RouteOutcome::Next(node)
    }
}

impl From<Vec<String>> for RouteOutcome {
    fn from(nodes: Vec<String>) -> Self {
        RouteOutcome::Parallel(nodes)
    }
}

impl From<Vec<DispatchUnit>> for RouteOutcome {
    fn from(units: Vec<DispatchUnit>) -> Self {
        RouteOutcome::Dispatch(units)
    }
}

impl From<DispatchUnit> for RouteOutcome {
    fn from(unit: DispatchUnit) -> Self {
        RouteOutcome::Dispatch(vec![unit])
    }
}
