//! Program response cache with TTL expiry.
//!
//! Keyed by `(port, address)`. Values are the serialized JSON payloads
//! exactly as served. Staleness is decided at read time against a caller
//! supplied `now`, so expired entries are never returned even though they
//! stay in the map until overwritten or purged.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::debug;

/// Default time a stored payload stays fresh.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(2);

/// Structural cache key. No normalization: the address is compared
/// case-sensitively and the port exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub port: u64,
    pub address: String,
}

impl CacheKey {
    pub fn new(port: u64, address: impl Into<String>) -> Self {
        Self {
            port,
            address: address.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// A stored payload. Never mutated after insertion.
#[derive(Debug, Clone)]
struct CacheEntry {
    stored_at: Instant,
    payload: String,
}

/// In-memory TTL cache of serialized program payloads.
///
/// Each `get`/`put` takes the lock on its own; a get-then-put sequence is
/// not atomic and racing writers resolve as last-write-wins.
pub struct ResponseCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
}

impl ResponseCache {
    /// Create an empty cache whose entries stay fresh for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stores: AtomicU64::new(0),
        }
    }

    /// Configured freshness window.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the stored payload for `key` if it was stored less than `ttl`
    /// before `now`.
    pub fn get(&self, key: &CacheKey, now: Instant) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let fresh = entries
            .get(key)
            .filter(|e| now.saturating_duration_since(e.stored_at) < self.ttl)
            .map(|e| e.payload.clone());
        drop(entries);

        match fresh {
            Some(payload) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(payload)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store `payload` for `key` at time `now`, replacing any previous entry.
    ///
    /// No-op when `should_store` is false, so failed or empty fetches never
    /// shadow a later successful one.
    pub fn put(&self, key: CacheKey, now: Instant, payload: String, should_store: bool) {
        if !should_store {
            debug!(key = %key, "Skipping cache store for invalid result");
            return;
        }
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            key,
            CacheEntry {
                stored_at: now,
                payload,
            },
        );
        self.stores.fetch_add(1, Ordering::Relaxed);
    }

    /// Drop every entry that is stale at `now`. Returns how many were removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let ttl = self.ttl;
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, e| now.saturating_duration_since(e.stored_at) < ttl);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "Purged expired cache entries");
        }
        removed
    }

    /// Return aggregate statistics about the cache.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
        }
    }

    /// Remove all entries from the cache.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of entries currently held, stale ones included.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Return `true` if the cache contains no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    /// Number of entries currently in the map.
    pub entries: usize,
    /// Lookups that returned a fresh payload.
    pub hits: u64,
    /// Lookups that found nothing fresh.
    pub misses: u64,
    /// Successful stores.
    pub stores: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn key() -> CacheKey {
        CacheKey::new(30002, "10.0.0.5")
    }

    #[test]
    fn test_cache_hit_miss() {
        let cache = ResponseCache::default();
        let now = Instant::now();
        assert!(cache.get(&key(), now).is_none());
        cache.put(key(), now, "payload".into(), true);
        assert_eq!(cache.get(&key(), now), Some("payload".into()));
    }

    #[test]
    fn test_cache_ttl_boundary() {
        let cache = ResponseCache::new(Duration::from_secs(2));
        let t0 = Instant::now();
        cache.put(key(), t0, "p".into(), true);
        assert_eq!(
            cache.get(&key(), t0 + Duration::from_millis(1900)),
            Some("p".into())
        );
        assert!(cache.get(&key(), t0 + Duration::from_millis(2100)).is_none());
    }

    #[test]
    fn test_cache_expires_exactly_at_ttl() {
        let cache = ResponseCache::new(Duration::from_secs(2));
        let t0 = Instant::now();
        cache.put(key(), t0, "p".into(), true);
        assert!(cache.get(&key(), t0 + Duration::from_secs(2)).is_none());
    }

    #[test]
    fn test_expired_entry_is_kept_until_purged() {
        let cache = ResponseCache::new(Duration::from_secs(2));
        let t0 = Instant::now();
        cache.put(key(), t0, "p".into(), true);
        let later = t0 + Duration::from_secs(3);
        assert!(cache.get(&key(), later).is_none());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.purge_expired(later), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_put_without_should_store_is_noop() {
        let cache = ResponseCache::default();
        let now = Instant::now();
        cache.put(key(), now, "bad".into(), false);
        assert!(cache.get(&key(), now).is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().stores, 0);
    }

    #[test]
    fn test_rejected_put_keeps_previous_entry() {
        let cache = ResponseCache::default();
        let now = Instant::now();
        cache.put(key(), now, "good".into(), true);
        cache.put(key(), now, "bad".into(), false);
        assert_eq!(cache.get(&key(), now), Some("good".into()));
    }

    #[test]
    fn test_put_overwrites_and_refreshes_timestamp() {
        let cache = ResponseCache::new(Duration::from_secs(2));
        let t0 = Instant::now();
        cache.put(key(), t0, "old".into(), true);
        let t1 = t0 + Duration::from_millis(1500);
        cache.put(key(), t1, "new".into(), true);
        assert_eq!(
            cache.get(&key(), t0 + Duration::from_millis(3000)),
            Some("new".into())
        );
    }

    #[test]
    fn test_keys_are_structural_and_case_sensitive() {
        let cache = ResponseCache::default();
        let now = Instant::now();
        cache.put(CacheKey::new(30002, "robot.local"), now, "a".into(), true);
        assert!(cache.get(&CacheKey::new(30002, "ROBOT.local"), now).is_none());
        assert!(cache.get(&CacheKey::new(30003, "robot.local"), now).is_none());
        assert_eq!(
            cache.get(&CacheKey::new(30002, "robot.local"), now),
            Some("a".into())
        );
    }

    #[test]
    fn test_stats_counts_hits_misses_and_stores() {
        let cache = ResponseCache::default();
        let now = Instant::now();
        let _ = cache.get(&key(), now);
        cache.put(key(), now, "p".into(), true);
        let _ = cache.get(&key(), now);
        let _ = cache.get(&key(), now);
        let stats = cache.stats();
        assert_eq!(
            stats,
            CacheStats {
                entries: 1,
                hits: 2,
                misses: 1,
                stores: 1,
            }
        );
    }

    #[test]
    fn test_clear() {
        let cache = ResponseCache::default();
        cache.put(key(), Instant::now(), "p".into(), true);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_writers_last_write_visible() {
        let cache = Arc::new(ResponseCache::default());
        let now = Instant::now();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    cache.put(key(), now, format!("v{i}"), true);
                    cache.get(&key(), now)
                })
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap().is_some());
        }
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&key(), now).unwrap().starts_with('v'));
    }

    #[test]
    fn test_key_display() {
        assert_eq!(key().to_string(), "10.0.0.5:30002");
    }
}
