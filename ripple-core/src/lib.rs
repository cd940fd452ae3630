//! Ripple Core
//!
//! This crate provides a fine-grained reactive core. It implements:
//!
//! - Reactive primitives (signals, computed values, effects)
//! - Automatic, dynamic dependency tracking
//! - Lazy invalidation with batched effect propagation
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Reactive primitives, dependency tracking and the runtime
//! - `graph`: The dependency graph and its propagation order
//! - `config`: Runtime limits
//! - `error`: Error types
//!
//! # Example
//!
//! ```rust
//! use ripple_core::reactive::{Computed, Effect, Runtime, Signal};
//!
//! # fn main() -> ripple_core::Result<()> {
//! let rt = Runtime::new();
//!
//! // Create signals
//! let price = Signal::new(&rt, 25.0_f64);
//! let quantity = Signal::new(&rt, 2_u32);
//!
//! // Create a derived value
//! let subtotal = Computed::new(&rt, {
//!     let (price, quantity) = (price.clone(), quantity.clone());
//!     move || Ok(price.get() * f64::from(quantity.get()))
//! });
//!
//! // Create an effect; keep the handle alive as long as it should run
//! let _log = Effect::new(&rt, {
//!     let subtotal = subtotal.clone();
//!     move || {
//!         println!("Subtotal: ${:.2}", subtotal.get()?);
//!         Ok(())
//!     }
//! })?;
//!
//! // Update a signal
//! quantity.set(3)?;
//! // Effect automatically runs, prints: "Subtotal: $75.00"
//! assert_eq!(subtotal.get()?, 75.0);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod reactive;

pub use config::{ConfigError, RuntimeConfig};
pub use error::{ReactiveError, Result};
pub use reactive::{Computed, Effect, Runtime, Signal};
