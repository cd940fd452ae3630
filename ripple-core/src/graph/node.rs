//! Graph Nodes
//!
//! This module defines the node types that live in the dependency graph.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Unique identifier for a node in the dependency graph.
///
/// Ids come from a process-wide counter, so they stay unique across
/// independent runtimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A source node (signal). These are the roots of the graph.
    /// They have no dependencies, only dependents.
    Source,

    /// A derived node (computed). These have dependencies and may have
    /// dependents. They cache their computed value.
    Derived,

    /// An effect node. These are leaves of the graph.
    /// They have dependencies but no dependents (they produce side effects, not values).
    Effect,
}

/// A node in the dependency graph.
#[derive(Debug)]
pub struct Node {
    id: NodeId,

    kind: NodeKind,

    /// Whether the node's cached result is known to be stale.
    dirty: bool,

    /// Nodes that this node read during its last evaluation (parents in the DAG).
    dependencies: IndexSet<NodeId>,

    /// Nodes that read this node during their last evaluation (children in the DAG).
    dependents: IndexSet<NodeId>,
}

impl Node {
    /// Create a new node with the given id and kind.
    ///
    /// Derived and effect nodes start dirty so their first read or run
    /// always evaluates.
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            dirty: !matches!(kind, NodeKind::Source),
            dependencies: IndexSet::new(),
            dependents: IndexSet::new(),
        }
    }

    /// Create a new source (signal) node with a fresh id.
    pub fn source() -> Self {
        Self::new(NodeId::new(), NodeKind::Source)
    }

    /// Create a new derived (computed) node with a fresh id.
    pub fn derived() -> Self {
        Self::new(NodeId::new(), NodeKind::Derived)
    }

    /// Create a new effect node with a fresh id.
    pub fn effect() -> Self {
        Self::new(NodeId::new(), NodeKind::Effect)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Mark the node as stale. Sources never become dirty.
    ///
    /// Returns `true` if the node was clean before.
    pub fn mark_dirty(&mut self) -> bool {
        if self.kind == NodeKind::Source || self.dirty {
            return false;
        }
        self.dirty = true;
        true
    }

    /// Add a dependency (a node that this node reads from).
    pub fn add_dependency(&mut self, node_id: NodeId) -> bool {
        self.dependencies.insert(node_id)
    }

    /// Remove a dependency.
    pub fn remove_dependency(&mut self, node_id: NodeId) -> bool {
        self.dependencies.shift_remove(&node_id)
    }

    pub fn dependencies(&self) -> &IndexSet<NodeId> {
        &self.dependencies
    }

    /// Add a dependent (a node that reads from this node).
    pub fn add_dependent(&mut self, node_id: NodeId) -> bool {
        self.dependents.insert(node_id)
    }

    /// Remove a dependent.
    pub fn remove_dependent(&mut self, node_id: NodeId) -> bool {
        self.dependents.shift_remove(&node_id)
    }

    pub fn dependents(&self) -> &IndexSet<NodeId> {
        &self.dependents
    }
}
