//! Dependency Graph
//!
//! This module implements the dependency graph that tracks relationships
//! between signals, computed values and effects.
//!
//! # Overview
//!
//! The dependency graph is a directed acyclic graph (DAG) where:
//!
//! - Nodes represent reactive values (signals) or computations (computed
//!   values, effects)
//! - Edges represent dependencies: if A depends on B, there is an edge from B to A
//!
//! When a signal changes, we traverse the graph to find all affected nodes,
//! mark derived nodes dirty and collect the effects that need to re-run.
//!
//! # Design Decisions
//!
//! 1. We use a centralized graph rather than per-cell subscriber lists because:
//!    - It enables topological ordering of effect runs
//!    - A single owner makes every edge mutation go through one place
//!
//! 2. The graph is indexed by node ID. Node and edge sets are
//!    insertion-ordered, so propagation order is deterministic.
//!
//! 3. We maintain both forward (dependencies) and reverse (dependents) edges
//!    to enable efficient traversal in both directions.

mod node;
mod scheduler;
mod snapshot;

pub use node::{Node, NodeId, NodeKind};
pub use scheduler::{Propagation, UpdateScheduler};
pub use snapshot::{GraphSnapshot, NodeSnapshot};
