//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, computed values,
//! and effects.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as a computed value or effect), the
//! signal automatically registers that context as a dependent. When the
//! signal's value changes, all dependents are notified.
//!
//! ## Computed values
//!
//! A Computed is a derived value that caches its result. It re-evaluates only
//! when one of its dependencies changed and someone reads it.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change. Effects are used to synchronize reactive state with
//! external systems, such as updating a widget or logging.
//!
//! # Implementation Notes
//!
//! Every cell belongs to a [`Runtime`], which owns the tracking stack and the
//! dependency graph. When a cell is read, the runtime checks whether some
//! evaluation is in progress and, if so, records the dependency.

mod computed;
mod context;
mod effect;
mod runtime;
mod signal;

pub use computed::Computed;
pub use effect::Effect;
pub use runtime::Runtime;
pub use signal::Signal;
