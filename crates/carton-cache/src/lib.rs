//! Content-addressed tarball acquisition for Carton.
//!
//! This crate turns resolved package records into verified files on disk:
//! downloads stream through a digest accumulator into a temp file, get
//! integrity-checked against the lockfile, and are atomically promoted into
//! a digest-addressed cache. Cached archives are then safely unpacked into
//! the workspace.

pub mod digest;
pub mod extract;
pub mod fetch;

// Re-export main types
pub use digest::{compute_digest, digest_filename, format_digest};
pub use extract::{extract, extract_all, CachedTarball};
pub use fetch::{FetchOutcome, Fetcher};

use carton_core::error::CartonError;

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CartonError>;
