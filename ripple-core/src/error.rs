//! Error types for the reactive core.
//!
//! Every failure is surfaced synchronously to the call that triggered it:
//! the `get()` that evaluated a computed value, the `set()` that flushed
//! effects, or the constructor that ran an effect for the first time.

use thiserror::Error;

use crate::graph::NodeId;

/// Boxed error produced by consumer code inside a computation or effect body.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the reactive runtime.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// A computed value re-entered its own evaluation, directly or through
    /// other computed values.
    #[error("cyclic dependency detected while evaluating {node}")]
    CyclicDependency {
        /// The node that was re-entered.
        node: NodeId,
    },

    /// Cascading writes from effects did not settle within the configured
    /// number of flush rounds.
    #[error("propagation did not settle after {rounds} flush rounds")]
    PropagationOverflow {
        /// Number of rounds that were drained before giving up.
        rounds: usize,
    },

    /// Nested evaluations went deeper than the configured limit.
    #[error("evaluation depth exceeded the limit of {depth}")]
    EvaluationDepthExceeded {
        /// The configured maximum depth.
        depth: usize,
    },

    /// A computation or effect body returned an error of its own.
    #[error("reactive callback failed: {0}")]
    Callback(#[source] BoxError),
}

impl ReactiveError {
    /// Wrap a consumer error so it can be returned from a body.
    ///
    /// ```rust,ignore
    /// let parsed = Computed::new(&rt, move || {
    ///     raw.get().parse::<i64>().map_err(ReactiveError::callback)
    /// });
    /// ```
    pub fn callback<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Callback(error.into())
    }

    /// Whether this error is a [`ReactiveError::CyclicDependency`].
    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::CyclicDependency { .. })
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;
