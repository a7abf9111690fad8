//! # Response Caching Stage
//!
//! TTL-based cache of backend responses keyed by `method:path`. Entries are
//! evicted lazily: an expired entry is treated as absent on read and
//! removed at that point, never returned. `put` unconditionally overwrites.
//!
//! Payloads are stored serialized. An entry that fails to deserialize is
//! counted as `CacheCorrupt`, removed, and degraded to a miss; corruption
//! never propagates to callers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use http::Method;
use serde::Serialize;
use tracing::{debug, warn};

use crate::core::types::{BackendResponse, ResponseSource};

/// A stored response with its insertion timestamp
///
/// Owned exclusively by the cache; overwritten on re-cache.
#[derive(Debug)]
struct CacheEntry {
    payload: Vec<u8>,
    inserted_at: Instant,
}

/// Hit/miss counters exposed to the observability layer
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub corrupt: u64,
}

/// Deterministic cache key from method and path, case-sensitive, no
/// normalization
pub fn cache_key(method: &Method, path: &str) -> String {
    format!("{method}:{path}")
}

/// TTL-based response cache, safe under concurrent access
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    entries: DashMap<String, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
    corrupt: AtomicU64,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            corrupt: AtomicU64::new(0),
        }
    }

    /// Look up a cached response
    ///
    /// Returns the stored payload with its source flipped to `Cache`, or
    /// nothing if the key is absent, expired, or corrupt. Expired and
    /// corrupt entries are evicted on this read.
    pub fn get(&self, key: &str, now: Instant) -> Option<BackendResponse> {
        // Clone the payload out under the entry guard; eviction happens
        // after the guard is dropped to avoid holding the shard lock.
        let stored = match self.entries.get(key) {
            Some(entry) => {
                if now.saturating_duration_since(entry.inserted_at) >= self.ttl {
                    None
                } else {
                    Some(entry.payload.clone())
                }
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key, "cache miss");
                return None;
            }
        };

        let bytes = match stored {
            Some(bytes) => bytes,
            None => {
                // Re-check staleness under the entry lock: a put racing
                // this read may have replaced the entry with a fresh one,
                // which must survive.
                self.entries.remove_if(key, |_, entry| {
                    now.saturating_duration_since(entry.inserted_at) >= self.ttl
                });
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key, "cache entry expired");
                return None;
            }
        };

        match serde_json::from_slice::<BackendResponse>(&bytes) {
            Ok(mut response) => {
                response.source = ResponseSource::Cache;
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key, "cache hit");
                Some(response)
            }
            Err(e) => {
                // Treated as a miss, never surfaced. Evict only if the
                // entry is still the corrupt payload we read.
                warn!(key, error = %e, "corrupt cache entry evicted");
                self.entries.remove_if(key, |_, entry| entry.payload == bytes);
                self.corrupt.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a response, unconditionally overwriting any previous entry
    pub fn put(&self, key: &str, response: &BackendResponse, now: Instant) {
        let payload = match serde_json::to_vec(response) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key, error = %e, "failed to serialize response, skipping cache write");
                return;
            }
        };
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                payload,
                inserted_at: now,
            },
        );
        debug!(key, "response cached");
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            corrupt: self.corrupt.load(Ordering::Relaxed),
        }
    }

    /// Insert raw bytes, bypassing serialization. Test hook for corruption
    /// handling.
    #[cfg(test)]
    fn put_raw(&self, key: &str, payload: Vec<u8>, now: Instant) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                payload,
                inserted_at: now,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response() -> BackendResponse {
        BackendResponse {
            status: 200,
            body: serde_json::json!({"message": "Mock response", "data": {"mock": true}}),
            integration: "mock".to_string(),
            latency: Duration::from_millis(8),
            source: ResponseSource::Backend,
        }
    }

    #[test]
    fn test_round_trip_within_ttl() {
        let cache = ResponseCache::new(Duration::from_secs(300));
        let now = Instant::now();
        let key = cache_key(&Method::GET, "/foo");

        cache.put(&key, &sample_response(), now);
        let hit = cache.get(&key, now + Duration::from_millis(1)).unwrap();
        assert_eq!(hit.status, 200);
        assert_eq!(hit.body, sample_response().body);
        // Replayed entries are marked as coming from the cache
        assert_eq!(hit.source, ResponseSource::Cache);
    }

    #[test]
    fn test_expired_entry_is_never_returned() {
        let cache = ResponseCache::new(Duration::from_millis(100));
        let now = Instant::now();

        cache.put("GET:/foo", &sample_response(), now);
        assert!(cache
            .get("GET:/foo", now + Duration::from_millis(101))
            .is_none());
        // Evicted on that read
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let cache = ResponseCache::new(Duration::from_millis(100));
        let now = Instant::now();

        cache.put("k", &sample_response(), now);
        assert!(cache.get("k", now + Duration::from_millis(99)).is_some());
        // age == ttl counts as expired
        cache.put("k", &sample_response(), now);
        assert!(cache.get("k", now + Duration::from_millis(100)).is_none());
    }

    #[test]
    fn test_repeated_gets_return_identical_payload() {
        let cache = ResponseCache::new(Duration::from_secs(300));
        let now = Instant::now();
        cache.put("k", &sample_response(), now);

        let first = cache.get("k", now).unwrap();
        let second = cache.get("k", now + Duration::from_secs(1)).unwrap();
        assert_eq!(first.body, second.body);
        assert_eq!(first.status, second.status);
    }

    #[test]
    fn test_put_overwrites() {
        let cache = ResponseCache::new(Duration::from_secs(300));
        let now = Instant::now();

        cache.put("k", &sample_response(), now);
        let mut updated = sample_response();
        updated.body = serde_json::json!({"message": "updated"});
        cache.put("k", &updated, now);

        let hit = cache.get("k", now).unwrap();
        assert_eq!(hit.body, serde_json::json!({"message": "updated"}));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let cache = ResponseCache::new(Duration::from_secs(300));
        let now = Instant::now();

        cache.put(&cache_key(&Method::GET, "/Foo"), &sample_response(), now);
        assert!(cache.get(&cache_key(&Method::GET, "/foo"), now).is_none());
        assert!(cache.get(&cache_key(&Method::GET, "/Foo"), now).is_some());
    }

    #[test]
    fn test_corrupt_entry_treated_as_miss_and_evicted() {
        let cache = ResponseCache::new(Duration::from_secs(300));
        let now = Instant::now();

        cache.put_raw("k", b"not json at all".to_vec(), now);
        assert!(cache.get("k", now).is_none());
        assert!(cache.is_empty());

        let stats = cache.stats();
        assert_eq!(stats.corrupt, 1);
        assert_eq!(stats.hits, 0);
    }

    #[test]
    fn test_expired_eviction_spares_racing_fresh_entry() {
        // A get observing a stale entry must not evict a fresh entry
        // written by a racing put: whichever order the remove and the put
        // land in, the fresh response survives.
        let ttl = Duration::from_millis(100);
        let mut fresh = sample_response();
        fresh.body = serde_json::json!({"message": "fresh"});

        for _ in 0..50 {
            let cache = ResponseCache::new(ttl);
            let t0 = Instant::now();
            cache.put("k", &sample_response(), t0);
            let later = t0 + ttl;

            std::thread::scope(|scope| {
                scope.spawn(|| {
                    // Stale at `later`; triggers the eviction path
                    cache.get("k", later);
                });
                scope.spawn(|| {
                    cache.put("k", &fresh, later);
                });
            });

            let hit = cache.get("k", later + Duration::from_millis(1)).unwrap();
            assert_eq!(hit.body, serde_json::json!({"message": "fresh"}));
        }
    }

    #[test]
    fn test_stats_count_hits_and_misses() {
        let cache = ResponseCache::new(Duration::from_secs(300));
        let now = Instant::now();

        assert!(cache.get("absent", now).is_none());
        cache.put("k", &sample_response(), now);
        assert!(cache.get("k", now).is_some());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }
}
