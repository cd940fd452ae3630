//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Computed Values Work
//!
//! 1. On first access, the computed value runs its function and caches the
//!    result, recording every cell the function read.
//!
//! 2. When accessed again, if no dependency has changed, it returns the
//!    cached value.
//!
//! 3. When a dependency changes, the runtime marks it dirty. Nothing runs yet.
//!
//! 4. On next access, it recomputes and rebuilds its dependency set from
//!    scratch, so branches that stopped reading a cell stop listening to it.
//!
//! # Why This Matters
//!
//! - A signal changes
//! - 10 computed values depend on it
//! - Only the ones actually read will recompute
//! - Values that are never read stay dirty (no wasted work)
//!
//! # Failure Modes
//!
//! - **Function returns `Err`**: the cached value is kept, the cell stays
//!   dirty so the next read retries, and the error goes to the reader.
//! - **Cycle**: reading a computed value from inside its own evaluation
//!   fails with `CyclicDependency`. No edge is recorded for that read.

use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug};
use std::rc::Rc;

use super::runtime::{ReactiveHandle, Runtime};
use crate::error::{ReactiveError, Result};
use crate::graph::{NodeId, NodeKind};

type ComputeFn<T> = dyn Fn() -> Result<T>;

struct ComputedInner<T> {
    handle: ReactiveHandle,
    compute: Box<ComputeFn<T>>,
    /// Cached result (None only before the first successful computation).
    value: RefCell<Option<T>>,
    compute_count: Cell<usize>,
}

/// A lazily-evaluated, memoized value derived from other cells.
///
/// Cloning a `Computed` creates a new handle to the **same** cell.
///
/// ```rust,ignore
/// let subtotal = Computed::new(&rt, {
///     let (price, quantity) = (price.clone(), quantity.clone());
///     move || Ok(price.get() * quantity.get() as f64)
/// });
/// let total = Computed::new(&rt, {
///     let (subtotal, tax) = (subtotal.clone(), tax.clone());
///     move || Ok(subtotal.get()? + tax.get()?)
/// });
/// ```
pub struct Computed<T: 'static> {
    inner: Rc<ComputedInner<T>>,
}

impl<T: Clone + 'static> Computed<T> {
    /// Create a new computed value with the given function.
    ///
    /// The function is not run immediately. It runs on first access.
    pub fn new<F>(runtime: &Runtime, compute: F) -> Self
    where
        F: Fn() -> Result<T> + 'static,
    {
        Self {
            inner: Rc::new(ComputedInner {
                handle: runtime.register(NodeKind::Derived),
                compute: Box::new(compute),
                value: RefCell::new(None),
                compute_count: Cell::new(0),
            }),
        }
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// Inside a reactive context this also registers the current
    /// computation as a dependent.
    pub fn get(&self) -> Result<T> {
        let id = self.id();
        let runtime = self.runtime();

        if runtime.is_evaluating(id) {
            tracing::warn!(computed = %id, "computed value read during its own evaluation");
            return Err(ReactiveError::CyclicDependency { node: id });
        }

        runtime.record_read(id);
        self.current()
    }

    /// Get the current value without tracking the read.
    ///
    /// Still recomputes when dirty; the computation's own reads are tracked
    /// for this cell as usual.
    pub fn get_untracked(&self) -> Result<T> {
        let id = self.id();
        if self.runtime().is_evaluating(id) {
            return Err(ReactiveError::CyclicDependency { node: id });
        }
        self.current()
    }

    fn current(&self) -> Result<T> {
        if !self.is_dirty() {
            if let Some(value) = self.inner.value.borrow().as_ref() {
                return Ok(value.clone());
            }
        }

        let value = self.evaluate()?;
        *self.inner.value.borrow_mut() = Some(value.clone());
        Ok(value)
    }

    fn evaluate(&self) -> Result<T> {
        let id = self.id();
        let runtime = self.runtime();

        let result = {
            let _ctx = runtime.begin_tracking(id)?;
            (self.inner.compute)()
        };

        let value = result?;
        runtime.mark_clean(id);
        self.inner.compute_count.set(self.inner.compute_count.get() + 1);
        tracing::trace!(computed = %id, count = self.inner.compute_count.get(), "recomputed");
        Ok(value)
    }
}

impl<T: 'static> Computed<T> {
    pub fn id(&self) -> NodeId {
        self.inner.handle.node()
    }

    /// The runtime this computed value belongs to.
    pub fn runtime(&self) -> &Runtime {
        self.inner.handle.runtime()
    }

    /// Whether the next read will run the function.
    pub fn is_dirty(&self) -> bool {
        self.runtime().is_dirty(self.id())
    }

    /// Check if a value has been computed successfully at least once.
    pub fn has_value(&self) -> bool {
        self.inner.value.borrow().is_some()
    }

    /// How many times the function has produced a value.
    pub fn compute_count(&self) -> usize {
        self.inner.compute_count.get()
    }

    /// Number of cells read during the last evaluation.
    pub fn dependency_count(&self) -> usize {
        self.runtime().dependency_count(self.id())
    }

    /// Number of cells that read this value during their last run.
    pub fn dependent_count(&self) -> usize {
        self.runtime().dependent_count(self.id())
    }
}

impl<T: 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug + 'static> Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.id())
            .field("cached", &*self.inner.value.borrow())
            .field("dirty", &self.is_dirty())
            .field("compute_count", &self.compute_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;

    #[test]
    fn computed_runs_on_first_access() {
        let rt = Runtime::new();
        let memo = Computed::new(&rt, || Ok(42));

        // Not computed yet
        assert!(!memo.has_value());
        assert!(memo.is_dirty());
        assert_eq!(memo.compute_count(), 0);

        assert_eq!(memo.get().unwrap(), 42);
        assert_eq!(memo.compute_count(), 1);
        assert!(memo.has_value());
        assert!(!memo.is_dirty());
    }

    #[test]
    fn computed_caches_value_when_clean() {
        let rt = Runtime::new();
        let memo = Computed::new(&rt, || Ok(42));

        assert_eq!(memo.get().unwrap(), 42);
        assert_eq!(memo.get().unwrap(), 42);
        assert_eq!(memo.get().unwrap(), 42);
        assert_eq!(memo.compute_count(), 1);
    }

    #[test]
    fn write_marks_dirty_without_recomputing() {
        let rt = Runtime::new();
        let signal = Signal::new(&rt, 10);
        let doubled = Computed::new(&rt, {
            let signal = signal.clone();
            move || Ok(signal.get() * 2)
        });

        assert_eq!(doubled.get().unwrap(), 20);

        signal.set(5).unwrap();
        signal.set(6).unwrap();
        assert!(doubled.is_dirty());
        assert_eq!(doubled.compute_count(), 1);

        assert_eq!(doubled.get().unwrap(), 12);
        assert_eq!(doubled.compute_count(), 2);
    }

    #[test]
    fn failed_computation_keeps_cache_and_retries() {
        let rt = Runtime::new();
        let raw = Signal::new(&rt, "4".to_string());
        let parsed = Computed::new(&rt, {
            let raw = raw.clone();
            move || raw.get().parse::<i32>().map_err(ReactiveError::callback)
        });

        assert_eq!(parsed.get().unwrap(), 4);

        raw.set("four".to_string()).unwrap();
        assert!(matches!(parsed.get(), Err(ReactiveError::Callback(_))));
        assert!(parsed.is_dirty());
        assert!(parsed.has_value());
        // The failed run still subscribed to `raw`.
        assert_eq!(raw.subscriber_count(), 1);

        raw.set("5".to_string()).unwrap();
        assert_eq!(parsed.get().unwrap(), 5);
        assert_eq!(parsed.compute_count(), 2);
    }

    #[test]
    fn self_read_is_a_cycle() {
        let rt = Runtime::new();
        let slot: Rc<RefCell<Option<Computed<i32>>>> = Rc::new(RefCell::new(None));

        let looping = Computed::new(&rt, {
            let slot = slot.clone();
            move || match slot.borrow().as_ref() {
                Some(me) => me.get(),
                None => Ok(0),
            }
        });
        *slot.borrow_mut() = Some(looping.clone());

        let err = looping.get().unwrap_err();
        assert!(matches!(err, ReactiveError::CyclicDependency { node } if node == looping.id()));
        assert_eq!(looping.dependency_count(), 0);

        // Break the Rc cycle so the node is released.
        slot.borrow_mut().take();
    }

    #[test]
    fn computed_clone_shares_state() {
        let rt = Runtime::new();
        let memo1 = Computed::new(&rt, || Ok(42));

        assert_eq!(memo1.get().unwrap(), 42);

        let memo2 = memo1.clone();

        assert_eq!(memo1.id(), memo2.id());
        assert!(memo2.has_value());
        assert_eq!(memo2.get().unwrap(), 42);
        assert_eq!(memo2.compute_count(), 1);
    }

    #[test]
    fn untracked_read_does_not_subscribe_reader() {
        let rt = Runtime::new();
        let inner = Computed::new(&rt, || Ok(1));
        let outer = Computed::new(&rt, {
            let inner = inner.clone();
            move || Ok(inner.get_untracked()? + 1)
        });

        assert_eq!(outer.get().unwrap(), 2);
        assert_eq!(inner.dependent_count(), 0);
        assert_eq!(outer.dependency_count(), 0);
    }
}
