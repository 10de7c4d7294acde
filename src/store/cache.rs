//! Payload cache, one entry per feed (plus optional caller-supplied variant).

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::{KeyValueStore, StoreError};

/// Cache lifetime configuration for a feed.
///
/// `Disabled` is a configuration switch, not a store feature: when caching is
/// disabled the renderer never touches the cache store at all — every read is
/// a forced miss and every write a no-op. The store itself only ever sees
/// concrete TTLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTtl {
    /// Bypass the cache store entirely.
    Disabled,
    /// Cache entries expire after this duration.
    After(Duration),
}

impl CacheTtl {
    /// Convenience constructor from whole seconds.
    pub fn seconds(secs: u64) -> Self {
        Self::After(Duration::from_secs(secs))
    }

    /// Returns the concrete duration, or `None` when caching is disabled.
    pub fn duration(self) -> Option<Duration> {
        match self {
            Self::Disabled => None,
            Self::After(d) => Some(d),
        }
    }
}

impl Default for CacheTtl {
    /// One hour.
    fn default() -> Self {
        Self::seconds(3600)
    }
}

/// Typed view over the store slot holding a feed's cached payload
/// (conventionally keyed `{identity_key}-cache{-suffix}`).
///
/// Entries are created on cache miss and destroyed either explicitly via
/// [`invalidate`](Self::invalidate) (the write-event path) or implicitly by
/// the store's TTL handling.
#[derive(Clone)]
pub struct CacheStore {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl CacheStore {
    /// Creates a view bound to the given cache key.
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Returns the cache key this view reads and writes.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Fetches the cached payload. `None` is a true miss: any JSON value,
    /// including `null`, is a present payload.
    pub async fn get(&self) -> Result<Option<Value>, StoreError> {
        self.store.get(&self.key).await
    }

    /// Caches `payload` for `ttl`.
    pub async fn set(&self, payload: Value, ttl: Duration) -> Result<(), StoreError> {
        self.store.set(&self.key, payload, Some(ttl)).await
    }

    /// Deletes the cached payload. Idempotent.
    pub async fn invalidate(&self) -> Result<(), StoreError> {
        self.store.delete(&self.key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[test]
    fn ttl_modes() {
        assert_eq!(CacheTtl::Disabled.duration(), None);
        assert_eq!(
            CacheTtl::seconds(60).duration(),
            Some(Duration::from_secs(60))
        );
        assert_eq!(CacheTtl::default(), CacheTtl::seconds(3600));
    }

    #[tokio::test]
    async fn populate_and_invalidate() {
        let backend = Arc::new(MemoryStore::new());
        let cache = CacheStore::new(backend, "deals-cache");

        assert_eq!(cache.get().await.unwrap(), None);
        cache
            .set(json!([{"id": 1}]), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get().await.unwrap(), Some(json!([{"id": 1}])));

        cache.invalidate().await.unwrap();
        assert_eq!(cache.get().await.unwrap(), None);
        // invalidating an empty slot is fine
        cache.invalidate().await.unwrap();
    }
}
