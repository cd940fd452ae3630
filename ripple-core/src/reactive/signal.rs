//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (computed/effect), the
//!    runtime records that context as a dependent.
//!
//! 2. When a signal is set to a value that differs from the current one,
//!    every transitive dependent is invalidated and dependent effects run.
//!
//! 3. Setting an equal value is a no-op: nothing is invalidated or re-run.
//!
//! Equality defaults to `PartialEq`; [`Signal::with_equality`] takes a custom
//! comparison for types without one, or for looser notions of "changed".

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::Rc;

use super::runtime::{ReactiveHandle, Runtime};
use crate::error::Result;
use crate::graph::{NodeId, NodeKind};

type EqualsFn<T> = dyn Fn(&T, &T) -> bool;

struct SignalInner<T> {
    handle: ReactiveHandle,
    value: RefCell<T>,
    equals: Box<EqualsFn<T>>,
}

/// A reactive signal holding a value of type T.
///
/// Cloning a signal yields another handle to the same cell. The cell leaves
/// the graph when its last handle is dropped.
///
/// # Example
///
/// ```rust,ignore
/// let rt = Runtime::new();
/// let count = Signal::new(&rt, 0);
///
/// // Read the value
/// let value = count.get();
///
/// // Update the value (notifies dependents)
/// count.set(5)?;
/// ```
pub struct Signal<T: 'static> {
    inner: Rc<SignalInner<T>>,
}

impl<T: PartialEq + 'static> Signal<T> {
    /// Create a new signal with the given initial value.
    pub fn new(runtime: &Runtime, value: T) -> Self {
        Self::with_equality(runtime, value, |a, b| a == b)
    }
}

impl<T: 'static> Signal<T> {
    /// Create a signal that uses `equals` to decide whether a write changes it.
    pub fn with_equality<F>(runtime: &Runtime, value: T, equals: F) -> Self
    where
        F: Fn(&T, &T) -> bool + 'static,
    {
        Self {
            inner: Rc::new(SignalInner {
                handle: runtime.register(NodeKind::Source),
                value: RefCell::new(value),
                equals: Box::new(equals),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> NodeId {
        self.inner.handle.node()
    }

    /// The runtime this signal belongs to.
    pub fn runtime(&self) -> &Runtime {
        self.inner.handle.runtime()
    }

    /// Borrow the current value, tracking the read.
    ///
    /// The signal must not be written from inside `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.runtime().record_read(self.id());
        f(&self.inner.value.borrow())
    }

    /// Set a new value and propagate the change.
    ///
    /// Returns the first error raised by an effect this write ran. When
    /// called inside a batch or an effect, the effects run later and their
    /// errors surface there instead.
    pub fn set(&self, value: T) -> Result<()> {
        {
            let current = self.inner.value.borrow();
            if (self.inner.equals)(&current, &value) {
                tracing::trace!(signal = %self.id(), "write of equal value ignored");
                return Ok(());
            }
        }

        *self.inner.value.borrow_mut() = value;
        self.runtime().notify(self.id())
    }

    /// Update the value using a function.
    ///
    /// This is useful for updates that depend on the current value.
    /// The read of the current value is not tracked.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = {
            let guard = self.inner.value.borrow();
            f(&guard)
        };
        self.set(new_value)
    }

    /// Get the number of cells that read this signal during their last run.
    pub fn subscriber_count(&self) -> usize {
        self.runtime().dependent_count(self.id())
    }
}

impl<T: Clone + 'static> Signal<T> {
    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a dependent.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Get the current value without tracking dependencies.
    ///
    /// Use this when you need to read the value without establishing
    /// a reactive dependency.
    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }
}

impl<T: 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug + 'static> Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id())
            .field("value", &*self.inner.value.borrow())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
