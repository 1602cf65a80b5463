//! In-memory TTL cache for API response payloads.
//!
//! Entries are validated at read time only; a stale entry stays in place
//! until the next successful fetch for its key overwrites it.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

struct CacheEntry {
    payload: Arc<Value>,
    stored_at: Instant,
}

/// Shared response cache keyed by request key.
///
/// Cloning is cheap and shares the same entries.
#[derive(Clone)]
pub struct ResponseCache {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
    ttl: Duration,
}

impl ResponseCache {
    /// Create a cache whose entries are valid for `ttl` after storage.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Get a cached payload if a valid (non-expired) entry exists.
    pub async fn get(&self, key: &str) -> Option<Arc<Value>> {
        let entries = self.entries.lock().await;
        match entries.get(key) {
            // Strict comparison: an entry exactly at the TTL edge is stale.
            Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                debug!(key = key, "Cache hit");
                Some(Arc::clone(&entry.payload))
            }
            Some(_) => {
                debug!(key = key, "Cache entry expired");
                None
            }
            None => {
                debug!(key = key, "Cache miss");
                None
            }
        }
    }

    /// Store a payload, overwriting any prior entry for the key.
    pub async fn insert(&self, key: impl Into<String>, payload: Arc<Value>) {
        let key = key.into();
        let mut entries = self.entries.lock().await;
        debug!(key = %key, "Cache stored");
        entries.insert(
            key,
            CacheEntry {
                payload,
                stored_at: Instant::now(),
            },
        );
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().await;
        let live_entries = entries
            .values()
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .count();

        CacheStats {
            total_entries: entries.len(),
            live_entries,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub total_entries: usize,
    pub live_entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(id: u32) -> Arc<Value> {
        Arc::new(json!({ "mal_id": id }))
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_within_ttl() {
        let cache = ResponseCache::new(Duration::from_secs(600));
        cache.insert("/anime/1", payload(1)).await;

        tokio::time::advance(Duration::from_secs(599)).await;
        let hit = cache.get("/anime/1").await;
        assert!(hit.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expires_at_ttl_boundary() {
        let cache = ResponseCache::new(Duration::from_secs(600));
        cache.insert("/anime/1", payload(1)).await;

        tokio::time::advance(Duration::from_secs(600)).await;
        assert!(cache.get("/anime/1").await.is_none());

        // The stale entry is still held until overwritten.
        let stats = cache.stats().await;
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.live_entries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_refreshes_entry() {
        let cache = ResponseCache::new(Duration::from_secs(600));
        cache.insert("/anime/1", payload(1)).await;

        tokio::time::advance(Duration::from_secs(700)).await;
        assert!(cache.get("/anime/1").await.is_none());

        let fresh = payload(2);
        cache.insert("/anime/1", Arc::clone(&fresh)).await;
        let hit = cache.get("/anime/1").await;
        assert!(hit.is_some_and(|value| Arc::ptr_eq(&value, &fresh)));
    }

    #[tokio::test]
    async fn test_miss_for_unknown_key() {
        let cache = ResponseCache::new(Duration::from_secs(600));
        assert!(cache.get("/anime/404").await.is_none());
    }
}
