//! Update Scheduler
//!
//! The scheduler owns the dependency graph and decides which nodes a change
//! reaches and in what order they should be handled.
//!
//! # Algorithm
//!
//! When a source node changes:
//!
//! 1. Walk its dependents breadth-first, visiting every node at most once.
//!    Diamonds (two paths to the same node) are reached only once.
//! 2. Mark every visited derived node dirty. Nothing is recomputed here;
//!    derived nodes recompute lazily on their next read.
//! 3. Sort the visited nodes topologically (dependencies before dependents)
//!    and hand back the effect nodes in that order.
//!
//! Because derived values are pulled on read, an effect that runs first
//! still sees fully settled values: it recomputes whatever dirty ancestors
//! it touches.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::{IndexMap, IndexSet};

use super::node::{Node, NodeId, NodeKind};
use super::snapshot::{GraphSnapshot, NodeSnapshot};

/// Outcome of marking a source node as changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Propagation {
    /// Derived nodes that went from clean to dirty.
    pub invalidated: Vec<NodeId>,

    /// Effect nodes reached by the change, in topological order.
    pub effects: Vec<NodeId>,
}

impl Propagation {
    pub fn is_empty(&self) -> bool {
        self.invalidated.is_empty() && self.effects.is_empty()
    }
}

/// The update scheduler manages the dependency graph and coordinates updates.
#[derive(Debug, Default)]
pub struct UpdateScheduler {
    /// All nodes in the graph, in creation order.
    nodes: IndexMap<NodeId, Node>,
}

impl UpdateScheduler {
    /// Create a new empty scheduler.
    pub fn new() -> Self {
        Self {
            nodes: IndexMap::new(),
        }
    }

    /// Add a node to the graph.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id();
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node from the graph.
    ///
    /// Also removes all edges involving this node.
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let node = self.nodes.shift_remove(&node_id)?;

        for dep_id in node.dependencies() {
            if let Some(dep) = self.nodes.get_mut(dep_id) {
                dep.remove_dependent(node_id);
            }
        }

        for dependent_id in node.dependents() {
            if let Some(dependent) = self.nodes.get_mut(dependent_id) {
                dependent.remove_dependency(node_id);
            }
        }

        tracing::trace!(node = %node_id, kind = ?node.kind(), "removed node");
        Some(node)
    }

    pub fn contains(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    pub fn get_node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    pub fn get_node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Add a dependency edge: `dependent` depends on `dependency`.
    ///
    /// Both nodes must exist. Returns `true` if the edge is new.
    pub fn add_edge(&mut self, dependency: NodeId, dependent: NodeId) -> bool {
        if dependency == dependent
            || !self.nodes.contains_key(&dependency)
            || !self.nodes.contains_key(&dependent)
        {
            return false;
        }

        let added = self
            .nodes
            .get_mut(&dependency)
            .map(|node| node.add_dependent(dependent))
            .unwrap_or(false);
        if let Some(node) = self.nodes.get_mut(&dependent) {
            node.add_dependency(dependency);
        }

        if added {
            tracing::trace!(%dependency, %dependent, "added edge");
        }
        added
    }

    /// Remove a dependency edge.
    pub fn remove_edge(&mut self, dependency: NodeId, dependent: NodeId) {
        if let Some(dep_node) = self.nodes.get_mut(&dependency) {
            dep_node.remove_dependent(dependent);
        }
        if let Some(dependent_node) = self.nodes.get_mut(&dependent) {
            dependent_node.remove_dependency(dependency);
        }
    }

    /// Drop every dependency of `dependent` that is not in `touched`.
    ///
    /// Called at the end of an evaluation so a node stops hearing about
    /// cells it no longer reads. Returns the removed dependencies.
    pub fn retain_dependencies(
        &mut self,
        dependent: NodeId,
        touched: &IndexSet<NodeId>,
    ) -> Vec<NodeId> {
        let stale: Vec<NodeId> = match self.nodes.get(&dependent) {
            Some(node) => node
                .dependencies()
                .iter()
                .filter(|dep| !touched.contains(*dep))
                .copied()
                .collect(),
            None => return Vec::new(),
        };

        for &dep in &stale {
            self.remove_edge(dep, dependent);
        }

        if !stale.is_empty() {
            tracing::trace!(node = %dependent, removed = stale.len(), "dropped stale dependencies");
        }
        stale
    }

    /// Mark a source node as changed and propagate dirty flags.
    pub fn mark_changed(&mut self, source_id: NodeId) -> Propagation {
        let mut visited = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();

        if let Some(source) = self.nodes.get(&source_id) {
            queue.extend(source.dependents().iter().copied());
        }
        seen.insert(source_id);

        let mut propagation = Propagation::default();

        while let Some(node_id) = queue.pop_front() {
            if !seen.insert(node_id) {
                continue;
            }

            let Some(node) = self.nodes.get_mut(&node_id) else {
                continue;
            };

            let newly_dirty = node.mark_dirty();
            if newly_dirty && node.kind() == NodeKind::Derived {
                propagation.invalidated.push(node_id);
            }
            visited.push(node_id);

            queue.extend(node.dependents().iter().copied());
        }

        propagation.effects = self
            .topological_sort(visited)
            .into_iter()
            .filter(|id| {
                self.nodes
                    .get(id)
                    .map(|node| node.kind() == NodeKind::Effect)
                    .unwrap_or(false)
            })
            .collect();

        tracing::debug!(
            source = %source_id,
            invalidated = propagation.invalidated.len(),
            effects = propagation.effects.len(),
            "propagated change"
        );
        propagation
    }

    /// Perform a topological sort of the given nodes.
    ///
    /// Returns nodes in order such that dependencies come before dependents.
    /// Ties keep discovery order. Nodes caught in a cycle (which evaluation
    /// never records) are appended in discovery order rather than dropped.
    fn topological_sort(&self, nodes: Vec<NodeId>) -> Vec<NodeId> {
        let node_set: HashSet<_> = nodes.iter().copied().collect();
        let mut in_degree: HashMap<NodeId, usize> = HashMap::new();
        let mut result = Vec::with_capacity(nodes.len());
        let mut queue = VecDeque::new();

        // Calculate in-degrees (only counting edges within the node set)
        for &node_id in &nodes {
            if let Some(node) = self.nodes.get(&node_id) {
                let degree = node
                    .dependencies()
                    .iter()
                    .filter(|d| node_set.contains(d))
                    .count();
                in_degree.insert(node_id, degree);
                if degree == 0 {
                    queue.push_back(node_id);
                }
            }
        }

        // Kahn's algorithm
        while let Some(node_id) = queue.pop_front() {
            result.push(node_id);

            if let Some(node) = self.nodes.get(&node_id) {
                for &dependent_id in node.dependents() {
                    if let Some(degree) = in_degree.get_mut(&dependent_id) {
                        if *degree == 0 {
                            continue;
                        }
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(dependent_id);
                        }
                    }
                }
            }
        }

        if result.len() < in_degree.len() {
            let placed: HashSet<_> = result.iter().copied().collect();
            result.extend(
                nodes
                    .into_iter()
                    .filter(|id| in_degree.contains_key(id) && !placed.contains(id)),
            );
        }

        result
    }

    /// Get the total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Capture the current state of the graph.
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self
                .nodes
                .values()
                .map(|node| NodeSnapshot {
                    id: node.id(),
                    kind: node.kind(),
                    dirty: node.is_dirty(),
                    dependencies: node.dependencies().iter().copied().collect(),
                    dependents: node.dependents().iter().copied().collect(),
                })
                .collect(),
        }
    }
}
