//! Core data types for Carton package management.

pub mod package_id;

// Re-export all public types
pub use package_id::PackageId;
