//! Guarded Execution
//!
//! The orchestration layer: a [`Connector`] seam for warehouse adapters and
//! the [`GuardedExecutor`] that walks one IR through every gate in order.

pub mod connector;
pub mod executor;

pub use connector::Connector;
pub use executor::GuardedExecutor;
