//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! Each [`Runtime`] owns a stack of frames. When entering a reactive context
//! (running a computed value or an effect) we push a frame for that node; the
//! returned [`ReactiveContext`] guard pops it when dropped, on every exit path
//! including early `?` returns and panics.
//!
//! Popping a frame reconciles the node's dependencies: anything the node
//! read last time but not during this run is unsubscribed.
//!
//! Nested contexts are supported (a computed value reading another computed
//! value pushes a second frame). An untracked frame has no owner and
//! swallows reads.

use indexmap::IndexSet;
use smallvec::SmallVec;

use super::runtime::Runtime;
use crate::graph::NodeId;

/// An entry in the reactive context stack.
#[derive(Debug, Clone)]
pub(crate) struct ContextEntry {
    /// The node being evaluated, or `None` for an untracked scope.
    owner: Option<NodeId>,
    /// Nodes read during this evaluation, in first-read order.
    touched: IndexSet<NodeId>,
}

impl ContextEntry {
    pub(crate) fn owner(&self) -> Option<NodeId> {
        self.owner
    }

    pub(crate) fn touched(&self) -> &IndexSet<NodeId> {
        &self.touched
    }
}

/// The stack of evaluations in progress on one runtime.
#[derive(Debug, Default)]
pub(crate) struct ContextStack {
    frames: SmallVec<[ContextEntry; 8]>,
}

impl ContextStack {
    pub(crate) fn push(&mut self, owner: Option<NodeId>) {
        self.frames.push(ContextEntry {
            owner,
            touched: IndexSet::new(),
        });
    }

    pub(crate) fn pop(&mut self, expected: Option<NodeId>) -> Option<ContextEntry> {
        let popped = self.frames.pop();

        // Verify we're popping the right context.
        // This helps catch bugs where contexts are mismatched.
        if let Some(entry) = &popped {
            debug_assert_eq!(
                entry.owner, expected,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                expected, entry.owner
            );
        }
        popped
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }

    /// The node whose evaluation is innermost, if it is tracked.
    pub(crate) fn current_owner(&self) -> Option<NodeId> {
        self.frames.last().and_then(|entry| entry.owner)
    }

    /// Whether `node` is anywhere on the stack.
    pub(crate) fn contains(&self, node: NodeId) -> bool {
        self.frames.iter().any(|entry| entry.owner == Some(node))
    }

    /// Note a read of `node` in the innermost frame.
    ///
    /// Returns the reader when an edge should be recorded.
    pub(crate) fn track(&mut self, node: NodeId) -> Option<NodeId> {
        let entry = self.frames.last_mut()?;
        let owner = entry.owner?;
        if owner == node {
            return None;
        }
        entry.touched.insert(node);
        Some(owner)
    }
}

/// Guard that pops the context when dropped.
///
/// This ensures the context stack is properly maintained even if
/// the computation fails or panics.
#[must_use = "dropping the context immediately ends tracking"]
pub(crate) struct ReactiveContext {
    runtime: Runtime,
    owner: Option<NodeId>,
}

impl ReactiveContext {
    pub(crate) fn new(runtime: Runtime, owner: Option<NodeId>) -> Self {
        Self { runtime, owner }
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        self.runtime.end_tracking(self.owner);
    }
}
