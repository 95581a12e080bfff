//! In-memory metadata caching with TTL support.
//!
//! One resolution pass can ask for the same version document many times
//! (every `^`/`~` constraint on a popular package triggers a `latest`
//! lookup); caching keeps that to one network call per document.

use std::time::{Duration, SystemTime};

use dashmap::DashMap;

use crate::api::VersionMetadata;

/// Default freshness window for cached documents
const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Cache entry with TTL
#[derive(Debug, Clone)]
struct CacheEntry {
    metadata: VersionMetadata,
    stored_at: SystemTime,
    ttl: Duration,
}

impl CacheEntry {
    fn new(metadata: VersionMetadata, ttl: Duration) -> Self {
        Self {
            metadata,
            stored_at: SystemTime::now(),
            ttl,
        }
    }

    fn is_fresh(&self) -> bool {
        match self.stored_at.elapsed() {
            Ok(elapsed) => elapsed < self.ttl,
            Err(_) => false, // clock went backwards, consider stale
        }
    }
}

/// In-memory metadata cache keyed by request (`name/version` or
/// `name/latest`)
#[derive(Debug, Default)]
pub struct MetadataCache {
    cache: DashMap<String, CacheEntry>,
}

impl MetadataCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
        }
    }

    /// Get a cached document if still fresh
    pub fn get(&self, key: &str) -> Option<VersionMetadata> {
        let entry = self.cache.get(key)?;
        if entry.is_fresh() {
            Some(entry.metadata.clone())
        } else {
            drop(entry);
            self.cache.remove(key);
            None
        }
    }

    /// Store a document with the default TTL
    pub fn insert(&self, key: String, metadata: VersionMetadata) {
        self.insert_with_ttl(key, metadata, DEFAULT_TTL);
    }

    /// Store a document with a custom TTL
    pub fn insert_with_ttl(&self, key: String, metadata: VersionMetadata, ttl: Duration) {
        self.cache.insert(key, CacheEntry::new(metadata, ttl));
    }

    /// Number of entries currently held, fresh or not
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Drop everything
    pub fn clear(&self) {
        self.cache.clear();
    }
}
