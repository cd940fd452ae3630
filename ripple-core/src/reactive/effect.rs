//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the runtime queues the effect and runs it
//!    once per flush round.
//!
//! 3. Every run tracks its reads from scratch. Cells read last time but not
//!    this time are unsubscribed, so conditional reads only listen while
//!    their branch is taken.
//!
//! # Differences from Computed
//!
//! - Computed values return a value; effects do not.
//! - Computed values are lazy (compute on access); effects are eager (run when deps change).
//! - Computed values cache results; effects just run their side effect.
//!
//! # Lifetime
//!
//! The [`Effect`] handle is the only owner. It stays active until
//! [`Effect::dispose`] is called or the handle is dropped; keep the handle
//! for as long as the side effect should keep happening.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::runtime::{Reactive, ReactiveHandle, Runtime};
use crate::error::Result;
use crate::graph::{NodeId, NodeKind};

type EffectFn = dyn FnMut() -> Result<()>;

struct EffectInner {
    handle: ReactiveHandle,
    run: RefCell<Box<EffectFn>>,
    disposed: Cell<bool>,
    run_count: Cell<usize>,
}

impl EffectInner {
    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        let node = self.handle.node();
        self.handle.runtime().unregister(node);
        tracing::debug!(effect = %node, runs = self.run_count.get(), "disposed effect");
    }
}

impl Reactive for EffectInner {
    fn node_id(&self) -> NodeId {
        self.handle.node()
    }

    fn execute(&self) -> Result<()> {
        if self.disposed.get() {
            return Ok(());
        }

        let node = self.handle.node();
        let runtime = self.handle.runtime();

        let Ok(mut run) = self.run.try_borrow_mut() else {
            tracing::warn!(effect = %node, "effect re-entered while running, skipped");
            return Ok(());
        };

        let result = {
            let _ctx = runtime.begin_tracking(node)?;
            (&mut **run)()
        };

        runtime.mark_clean(node);
        self.run_count.set(self.run_count.get() + 1);
        tracing::trace!(effect = %node, count = self.run_count.get(), "ran effect");
        result
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust,ignore
/// let rt = Runtime::new();
/// let count = Signal::new(&rt, 0);
///
/// let effect = Effect::new(&rt, {
///     let count = count.clone();
///     move || {
///         println!("Count is: {}", count.get());
///         Ok(())
///     }
/// })?;
///
/// count.set(5)?;  // Prints: "Count is: 5"
/// ```
#[must_use = "an effect stops running as soon as its handle is dropped"]
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish initial dependencies. If
    /// that run (or an effect it triggers) fails, the error is returned and
    /// the new effect is disposed.
    pub fn new<F>(runtime: &Runtime, run: F) -> Result<Self>
    where
        F: FnMut() -> Result<()> + 'static,
    {
        let inner = Rc::new(EffectInner {
            handle: runtime.register(NodeKind::Effect),
            run: RefCell::new(Box::new(run)),
            disposed: Cell::new(false),
            run_count: Cell::new(0),
        });

        let weak: Weak<dyn Reactive> = Rc::downgrade(&inner) as Weak<dyn Reactive>;
        runtime.register_effect(weak, inner.handle.node());

        let effect = Self { inner };
        runtime.run_new_effect(&*effect.inner)?;
        Ok(effect)
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> NodeId {
        self.inner.handle.node()
    }

    /// Dispose of the effect.
    ///
    /// Removes it from every dependency set; it will not run again.
    /// Calling this more than once is harmless.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Get the number of cells read during the last run.
    pub fn dependency_count(&self) -> usize {
        self.inner
            .handle
            .runtime()
            .dependency_count(self.inner.handle.node())
    }
}

impl Drop for Effect {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
