//! In-memory caching for extract-step responses.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry {
    body: String,
    expires_at: Instant,
}

#[derive(Debug)]
struct CacheInner {
    map: HashMap<String, CacheEntry>,
    default_ttl: Duration,
}

impl CacheInner {
    fn new(default_ttl: Duration) -> Self {
        Self {
            map: HashMap::new(),
            default_ttl,
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).and_then(|entry| {
            if Instant::now() <= entry.expires_at {
                Some(entry.body.clone())
            } else {
                None
            }
        })
    }

    fn put(&mut self, key: String, body: String) {
        let expires_at = Instant::now() + self.default_ttl;
        self.map.insert(key, CacheEntry { body, expires_at });
    }
}

/// Thread-safe response cache keyed by the full request parameters.
///
/// The extract step consults this before touching the network so that two
/// runs with identical parameters inside the TTL window share one remote
/// call. A zero TTL disables the cache entirely.
#[derive(Debug, Clone)]
pub struct CacheStore {
    inner: Arc<tokio::sync::RwLock<CacheInner>>,
}

impl CacheStore {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(tokio::sync::RwLock::new(CacheInner::new(default_ttl))),
        }
    }

    /// Create a disabled cache: every lookup misses, every put is a no-op.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let store = self.inner.read().await;
        store.get(key)
    }

    pub async fn put(&self, key: String, body: String) {
        let mut store = self.inner.write().await;
        if store.default_ttl == Duration::ZERO {
            return;
        }
        store.put(key, body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn caches_within_ttl() {
        let cache = CacheStore::new(Duration::from_secs(60));

        assert!(cache.get("k").await.is_none());
        cache.put("k".to_string(), "v".to_string()).await;
        assert_eq!(cache.get("k").await, Some("v".to_string()));
    }

    #[tokio::test]
    async fn expires_after_ttl() {
        let cache = CacheStore::new(Duration::from_millis(50));

        cache.put("k".to_string(), "v".to_string()).await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn disabled_cache_never_stores() {
        let cache = CacheStore::disabled();

        cache.put("k".to_string(), "v".to_string()).await;
        assert!(cache.get("k").await.is_none());
    }
}
