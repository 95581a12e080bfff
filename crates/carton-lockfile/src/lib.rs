//! Lockfile model and graph walking for Carton.
//!
//! This crate owns the persisted dependency graph: the `Lockfile` data
//! model with its structural validator, and the deterministic post-order
//! walker that turns the root set into an install order.

pub mod graph;
pub mod model;

// Re-export main types
pub use graph::walk_all;
pub use model::{Lockfile, Package};

use carton_core::error::CartonError;

/// Result type for lockfile operations
pub type LockResult<T> = Result<T, CartonError>;
