//! Registry client for the Carton package manager.
//!
//! This crate provides the HTTP collaborator the resolver consults: package
//! metadata lookup for a literal name+version pair, and a "latest" lookup
//! used to translate wants-latest constraints into literal versions, plus an
//! in-memory TTL cache over both.

pub mod api;
pub mod cache;
pub mod client;

// Re-export main types
pub use api::{DistInfo, VersionMetadata};
pub use cache::MetadataCache;
pub use client::RegistryClient;

use carton_core::error::CartonError;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, CartonError>;
