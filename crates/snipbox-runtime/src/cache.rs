//! Cache of compiled artifacts.
//!
//! Compiling the same text twice against the same frozen reference set
//! yields the same artifact, so artifacts are cached by the BLAKE3 hash of
//! the submitted text with LRU eviction.
//!
//! # Examples
//!
//! ```
//! use snipbox_runtime::cache::ArtifactCache;
//!
//! let cache = ArtifactCache::new(16);
//! assert!(cache.is_enabled());
//! assert!(cache.get("(call $newline)").is_none());
//!
//! let disabled = ArtifactCache::new(0);
//! assert!(!disabled.is_enabled());
//! ```

use crate::compiler::{CompiledArtifact, source_hash};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// LRU cache of compiled artifacts keyed by source hash.
///
/// A capacity of zero disables caching: lookups always miss and inserts
/// are dropped.
pub struct ArtifactCache {
    entries: Option<Mutex<LruCache<String, Arc<CompiledArtifact>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for ArtifactCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .finish()
    }
}

impl ArtifactCache {
    /// Creates a cache holding up to `capacity` artifacts.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> Option<MutexGuard<'_, LruCache<String, Arc<CompiledArtifact>>>> {
        self.entries
            .as_ref()
            .map(|entries| entries.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Whether caching is enabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.entries.is_some()
    }

    /// Looks up the artifact compiled from `text`.
    pub fn get(&self, text: &str) -> Option<Arc<CompiledArtifact>> {
        let found = self.lock()?.get(&source_hash(text)).cloned();
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Stores `artifact` under its source hash.
    pub fn insert(&self, artifact: Arc<CompiledArtifact>) {
        if let Some(mut entries) = self.lock() {
            entries.put(artifact.hash().to_string(), artifact);
        }
    }

    /// Removes every entry.
    pub fn clear(&self) {
        if let Some(mut entries) = self.lock() {
            entries.clear();
        }
    }

    /// Number of cached artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().map_or(0, |entries| entries.len())
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of artifacts; zero when disabled.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.lock().map_or(0, |entries| entries.cap().get())
    }

    /// Lookups that found an artifact.
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Lookups that missed while caching was enabled.
    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::engine::build_engine;
    use crate::resolver::ReferenceSet;

    fn artifact(text: &str) -> Arc<CompiledArtifact> {
        Arc::new(compile(&build_engine().unwrap(), &ReferenceSet::default(), text))
    }

    #[test]
    fn test_hit_after_insert() {
        let cache = ArtifactCache::new(4);
        cache.insert(artifact("(call $newline)"));

        let hit = cache.get("(call $newline)").unwrap();
        assert!(hit.success());
        assert!(cache.get("(call $newline)\n").is_none());
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = ArtifactCache::new(2);
        cache.insert(artifact("(nop)"));
        cache.insert(artifact("(nop) (nop)"));
        assert!(cache.get("(nop)").is_some());

        cache.insert(artifact("(nop) (nop) (nop)"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("(nop) (nop)").is_none());
        assert!(cache.get("(nop)").is_some());
    }

    #[test]
    fn test_zero_capacity_disables() {
        let cache = ArtifactCache::new(0);
        cache.insert(artifact("(nop)"));
        assert!(cache.is_empty());
        assert_eq!(cache.capacity(), 0);
        assert!(cache.get("(nop)").is_none());
        assert_eq!(cache.misses(), 0);
    }

    #[test]
    fn test_clear() {
        let cache = ArtifactCache::new(2);
        cache.insert(artifact("(nop)"));
        cache.clear();
        assert!(cache.is_empty());
    }
}
