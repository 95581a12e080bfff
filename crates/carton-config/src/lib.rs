//! Manifest handling for Carton.
//!
//! The manifest (`carton.json`) is the user-edited input to the install
//! pipeline: a project name, a monotonic version integer, and a mapping of
//! dependency names to version constraints.

pub mod manifest;

// Re-export main types
pub use manifest::Manifest;

use carton_core::error::CartonError;

/// Result type for config operations
pub type ConfigResult<T> = Result<T, CartonError>;
