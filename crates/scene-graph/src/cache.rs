//! Object cache keyed by `cacheKey`
//!
//! Lets a node recreated with the same cache key pick up where its previous
//! instance left off. Entries outlive the nodes that wrote them.

use crate::state::SceneState;
use moka::sync::Cache;
use std::sync::Arc;

/// Last known state per cache key
#[derive(Clone)]
pub struct ObjectCache {
    inner: Cache<String, Arc<SceneState>>,
}

impl ObjectCache {
    /// Create a cache holding at most `max_capacity` entries
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
        }
    }

    /// Remember `state` under its cache key; no-op without one
    pub fn set(&self, state: &Arc<SceneState>) {
        if let Some(cache_key) = state.cache_key() {
            self.inner.insert(cache_key.to_string(), Arc::clone(state));
        }
    }

    /// Cached state for `cache_key`
    #[inline]
    #[must_use]
    pub fn get(&self, cache_key: &str) -> Option<Arc<SceneState>> {
        self.inner.get(cache_key)
    }

    /// State a new node should start from
    ///
    /// - no cache key: `state` as given
    /// - nothing cached yet: `state`, which is now cached
    /// - cached: the cached state with only the identity key replaced by
    ///   `state`'s key
    #[must_use]
    pub fn get_initial_state(&self, state: SceneState) -> Arc<SceneState> {
        let Some(cache_key) = state.cache_key() else {
            return Arc::new(state);
        };

        if let Some(cached) = self.inner.get(cache_key) {
            tracing::debug!(cache_key, key = %state.key(), "restoring state from cache");
            return Arc::new(cached.rekeyed(state.key()));
        }

        let state = Arc::new(state);
        self.set(&state);
        state
    }

    /// Drop one entry
    #[inline]
    pub fn remove(&self, cache_key: &str) {
        self.inner.invalidate(cache_key);
    }

    /// Drop every entry
    #[inline]
    pub fn clear(&self) {
        self.inner.invalidate_all();
    }

    /// Whether `cache_key` has an entry
    #[inline]
    #[must_use]
    pub fn contains(&self, cache_key: &str) -> bool {
        self.inner.contains_key(cache_key)
    }
}

impl std::fmt::Debug for ObjectCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectCache")
            .field("entry_count", &self.inner.entry_count())
            .finish()
    }
}
