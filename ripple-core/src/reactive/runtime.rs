//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, computed
//! values and effects. It owns the dependency graph, the tracking stack and
//! the queue of effects waiting to run.
//!
//! # How It Works
//!
//! 1. When a cell is created, it registers a node with the runtime.
//!
//! 2. When a computed value or effect reads a cell, the runtime records the
//!    dependency.
//!
//! 3. When a signal's value changes, the runtime:
//!    a. Finds all transitive dependents
//!    b. Marks computed values dirty (they recompute on next read)
//!    c. Queues effects
//!    d. Flushes the queue, unless a batch is open or a flush is running
//!
//! # Flushing
//!
//! A flush drains the queue in rounds. A round takes every queued effect and
//! runs each once. Writes made by those effects queue more effects for the
//! next round instead of re-entering the flush. Rounds are bounded by
//! [`RuntimeConfig::max_flush_rounds`].
//!
//! # Threading
//!
//! A runtime is single-threaded: it and every cell created from it are
//! `!Send`. Independent runtimes share nothing, so a read of one runtime's
//! cell inside another runtime's computation records no dependency.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexSet;

use super::context::{ContextStack, ReactiveContext};
use crate::config::RuntimeConfig;
use crate::error::{ReactiveError, Result};
use crate::graph::{GraphSnapshot, Node, NodeId, NodeKind, UpdateScheduler};

/// A cell the runtime can run on its own (effects).
pub(crate) trait Reactive {
    /// Get the node ID for this reactive value.
    fn node_id(&self) -> NodeId;

    /// Run the cell's body under tracking.
    fn execute(&self) -> Result<()>;
}

/// Handle to a registered node.
///
/// Dropping this handle removes the node and its edges from the graph.
pub(crate) struct ReactiveHandle {
    runtime: Runtime,
    node: NodeId,
}

impl ReactiveHandle {
    pub(crate) fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub(crate) fn node(&self) -> NodeId {
        self.node
    }
}

impl Drop for ReactiveHandle {
    fn drop(&mut self) {
        self.runtime.unregister(self.node);
    }
}

struct RuntimeInner {
    config: RuntimeConfig,
    graph: RefCell<UpdateScheduler>,
    context: RefCell<ContextStack>,
    /// Effects by node, held weakly: the `Effect` handle owns them.
    effects: RefCell<HashMap<NodeId, Weak<dyn Reactive>>>,
    /// Effects waiting for the next flush round, in discovery order.
    pending: RefCell<IndexSet<NodeId>>,
    batch_depth: Cell<usize>,
    flushing: Cell<bool>,
}

/// An independent reactive graph.
///
/// Cloning a `Runtime` yields another handle to the same graph.
///
/// ```rust,ignore
/// let rt = Runtime::new();
/// let count = Signal::new(&rt, 1);
/// let doubled = Computed::new(&rt, { let count = count.clone(); move || Ok(count.get() * 2) });
/// assert_eq!(doubled.get()?, 2);
/// ```
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a runtime with the given limits.
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                graph: RefCell::new(UpdateScheduler::new()),
                context: RefCell::new(ContextStack::default()),
                effects: RefCell::new(HashMap::new()),
                pending: RefCell::new(IndexSet::new()),
                batch_depth: Cell::new(0),
                flushing: Cell::new(false),
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Whether two handles refer to the same graph.
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run `f` with effect flushing deferred until the outermost batch ends.
    ///
    /// Effects touched by several writes inside the batch run once, seeing
    /// the final values. Returns the closure's value, or the first error
    /// raised by the effects flushed when the batch closes.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> Result<R> {
        let guard = BatchGuard::enter(self);
        let value = f();
        drop(guard);

        if self.inner.batch_depth.get() == 0 {
            self.flush()?;
        }
        Ok(value)
    }

    /// Run `f` without recording any dependency for the current evaluation.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.context.borrow_mut().push(None);
        let _ctx = ReactiveContext::new(self.clone(), None);
        f()
    }

    /// Whether reads right now would be recorded as dependencies.
    pub fn is_tracking(&self) -> bool {
        self.inner.context.borrow().current_owner().is_some()
    }

    /// The node currently being evaluated, if reads are tracked.
    pub fn current_observer(&self) -> Option<NodeId> {
        self.inner.context.borrow().current_owner()
    }

    /// Whether a batch is open.
    pub fn is_batching(&self) -> bool {
        self.inner.batch_depth.get() > 0
    }

    /// Number of live cells in the graph.
    pub fn node_count(&self) -> usize {
        self.inner.graph.borrow().node_count()
    }

    /// Number of effects queued for the next flush round.
    pub fn pending_effects(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    /// Capture the graph's nodes and edges.
    pub fn snapshot(&self) -> GraphSnapshot {
        self.inner.graph.borrow().snapshot()
    }

    // ------------------------------------------------------------------
    // Crate-internal plumbing used by the cell types
    // ------------------------------------------------------------------

    /// Add a node of the given kind to the graph.
    pub(crate) fn register(&self, kind: NodeKind) -> ReactiveHandle {
        let node = self
            .inner
            .graph
            .borrow_mut()
            .add_node(Node::new(NodeId::new(), kind));
        tracing::trace!(%node, ?kind, "registered node");

        ReactiveHandle {
            runtime: self.clone(),
            node,
        }
    }

    /// Make an effect runnable by the flush loop.
    pub(crate) fn register_effect(&self, effect: Weak<dyn Reactive>, node: NodeId) {
        self.inner.effects.borrow_mut().insert(node, effect);
    }

    /// Remove a node, its edges, and any queued run.
    pub(crate) fn unregister(&self, node: NodeId) {
        match self.inner.graph.try_borrow_mut() {
            Ok(mut graph) => {
                graph.remove_node(node);
            }
            Err(_) => {
                tracing::warn!(%node, "graph busy, node left in place");
            }
        }
        if let Ok(mut effects) = self.inner.effects.try_borrow_mut() {
            effects.remove(&node);
        }
        if let Ok(mut pending) = self.inner.pending.try_borrow_mut() {
            pending.shift_remove(&node);
        }
    }

    /// Record that the innermost evaluation read `node`.
    pub(crate) fn record_read(&self, node: NodeId) {
        let reader = self.inner.context.borrow_mut().track(node);
        if let Some(reader) = reader {
            self.inner.graph.borrow_mut().add_edge(node, reader);
        }
    }

    /// Whether `node` is being evaluated somewhere up the stack.
    pub(crate) fn is_evaluating(&self, node: NodeId) -> bool {
        self.inner.context.borrow().contains(node)
    }

    /// Push a tracking frame for `node`.
    ///
    /// Fails if `node` is already being evaluated or the stack is full.
    pub(crate) fn begin_tracking(&self, node: NodeId) -> Result<ReactiveContext> {
        {
            let mut context = self.inner.context.borrow_mut();
            if context.contains(node) {
                tracing::warn!(%node, "cyclic dependency");
                return Err(ReactiveError::CyclicDependency { node });
            }
            let limit = self.inner.config.max_evaluation_depth;
            if context.depth() >= limit {
                tracing::warn!(%node, limit, "evaluation depth exceeded");
                return Err(ReactiveError::EvaluationDepthExceeded { depth: limit });
            }
            context.push(Some(node));
        }
        Ok(ReactiveContext::new(self.clone(), Some(node)))
    }

    /// Pop the innermost frame and drop dependencies it did not touch.
    pub(crate) fn end_tracking(&self, owner: Option<NodeId>) {
        let Ok(mut context) = self.inner.context.try_borrow_mut() else {
            tracing::error!(?owner, "context stack busy while ending tracking");
            return;
        };
        let Some(entry) = context.pop(owner) else {
            return;
        };
        drop(context);

        if let Some(node) = entry.owner() {
            if let Ok(mut graph) = self.inner.graph.try_borrow_mut() {
                graph.retain_dependencies(node, entry.touched());
            }
        }
    }

    pub(crate) fn is_dirty(&self, node: NodeId) -> bool {
        self.inner
            .graph
            .borrow()
            .get_node(node)
            .map(Node::is_dirty)
            .unwrap_or(true)
    }

    pub(crate) fn mark_clean(&self, node: NodeId) {
        if let Some(node) = self.inner.graph.borrow_mut().get_node_mut(node) {
            node.mark_clean();
        }
    }

    pub(crate) fn dependent_count(&self, node: NodeId) -> usize {
        self.inner
            .graph
            .borrow()
            .get_node(node)
            .map(|node| node.dependents().len())
            .unwrap_or(0)
    }

    pub(crate) fn dependency_count(&self, node: NodeId) -> usize {
        self.inner
            .graph
            .borrow()
            .get_node(node)
            .map(|node| node.dependencies().len())
            .unwrap_or(0)
    }

    /// A signal changed: invalidate dependents, queue effects, and flush.
    pub(crate) fn notify(&self, source: NodeId) -> Result<()> {
        let propagation = self.inner.graph.borrow_mut().mark_changed(source);
        if !propagation.effects.is_empty() {
            self.inner
                .pending
                .borrow_mut()
                .extend(propagation.effects.iter().copied());
        }
        self.flush()
    }

    /// Run a freshly created effect for the first time.
    ///
    /// Inside a batch or an ongoing flush the effect still runs right away;
    /// only the effects its writes trigger are deferred.
    pub(crate) fn run_new_effect(&self, effect: &dyn Reactive) -> Result<()> {
        if self.inner.flushing.get() || self.inner.batch_depth.get() > 0 {
            return effect.execute();
        }

        let guard = FlushGuard::enter(self);
        let first = effect.execute();
        let rest = self.drain();
        drop(guard);

        first?;
        rest
    }

    /// Drain the pending queue unless a batch or flush is already in charge.
    fn flush(&self) -> Result<()> {
        if self.inner.flushing.get() || self.inner.batch_depth.get() > 0 {
            return Ok(());
        }
        if self.inner.pending.borrow().is_empty() {
            return Ok(());
        }

        let _guard = FlushGuard::enter(self);
        self.drain()
    }

    fn drain(&self) -> Result<()> {
        let limit = self.inner.config.max_flush_rounds;
        let mut first_error: Option<ReactiveError> = None;
        let mut rounds = 0;

        loop {
            let batch = std::mem::take(&mut *self.inner.pending.borrow_mut());
            if batch.is_empty() {
                break;
            }

            if rounds == limit {
                tracing::warn!(
                    rounds,
                    queued = batch.len(),
                    "effects kept re-triggering, dropping queue"
                );
                if let Some(err) = first_error {
                    tracing::error!(error = %err, "effect failed before overflow");
                }
                return Err(ReactiveError::PropagationOverflow { rounds });
            }
            rounds += 1;
            tracing::debug!(round = rounds, effects = batch.len(), "flushing effects");

            for node in batch {
                let effect = self
                    .inner
                    .effects
                    .borrow()
                    .get(&node)
                    .and_then(|effect| effect.upgrade());
                let Some(effect) = effect else {
                    continue;
                };

                if let Err(err) = effect.execute() {
                    if first_error.is_none() {
                        first_error = Some(err);
                    } else {
                        tracing::error!(node = %effect.node_id(), error = %err, "effect failed");
                    }
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("node_count", &self.node_count())
            .field("pending_effects", &self.pending_effects())
            .field("batch_depth", &self.inner.batch_depth.get())
            .field("flushing", &self.inner.flushing.get())
            .finish()
    }
}

/// Marks a flush in progress; cleared on every exit path.
struct FlushGuard<'a> {
    runtime: &'a Runtime,
}

impl<'a> FlushGuard<'a> {
    fn enter(runtime: &'a Runtime) -> Self {
        runtime.inner.flushing.set(true);
        Self { runtime }
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.runtime.inner.flushing.set(false);
    }
}

struct BatchGuard<'a> {
    runtime: &'a Runtime,
}

impl<'a> BatchGuard<'a> {
    fn enter(runtime: &'a Runtime) -> Self {
        let depth = &runtime.inner.batch_depth;
        depth.set(depth.get() + 1);
        Self { runtime }
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        let depth = &self.runtime.inner.batch_depth;
        depth.set(depth.get().saturating_sub(1));
    }
}
