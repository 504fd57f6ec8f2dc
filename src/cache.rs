//! Keyed cache with per-entry TTL
//!
//! Shared by the detector and the application repository. Entries are
//! immutable snapshots: a write replaces the whole value, readers clone it out.
//! Expired entries are treated as absent and evicted on the access that finds
//! them stale.
//!
//! Time comes from a [`Clock`] so expiry can be tested without sleeping.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`]
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for tests
#[derive(Debug, Clone)]
pub struct ManualClock {
    start: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Move time forward by `by`
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        self.start + *offset
    }
}

/// Cached value with the instant it was stored
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    data: V,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// An entry stays valid while `now - stored_at <= ttl`
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) > self.ttl
    }
}

/// Thread-safe TTL cache
///
/// Cloning is cheap and clones share the same storage, so one instance can be
/// handed to every component of a session.
pub struct TtlCache<V> {
    entries: Arc<RwLock<HashMap<String, CacheEntry<V>>>>,
    clock: Arc<dyn Clock>,
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache using the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a cache with a custom clock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Get a fresh value, evicting it if it turned stale
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired(now) => return Some(entry.data.clone()),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        // Another writer may have refreshed the key between the two locks
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
            tracing::debug!(key, "Evicted stale cache entry");
        }
        entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.data.clone())
    }

    /// Get a value regardless of age
    ///
    /// Used as last-known-good fallback when a refresh fails. Does not evict.
    pub fn get_stale(&self, key: &str) -> Option<V> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).map(|entry| entry.data.clone())
    }

    /// Store a value, replacing any previous entry
    pub fn insert(&self, key: impl Into<String>, data: V, ttl: Duration) {
        let entry = CacheEntry {
            data,
            stored_at: self.clock.now(),
            ttl,
        };
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.into(), entry);
    }

    /// Remove one key, returning whether it was present
    pub fn invalidate(&self, key: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key).is_some()
    }

    /// Remove every key starting with `prefix`, returning how many were dropped
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let total_entries = entries.len();
        let expired_entries = entries.values().filter(|e| e.is_expired(now)).count();

        CacheStats {
            total_entries,
            expired_entries,
            fresh_entries: total_entries - expired_entries,
        }
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of cached entries
    pub total_entries: usize,
    /// Number of expired entries not yet evicted
    pub expired_entries: usize,
    /// Number of fresh entries
    pub fresh_entries: usize,
}

/// Cache key for a context's installation status
pub fn installation_key(context: &str) -> String {
    format!("installation:{}", context)
}

/// Cache key for an application list
pub fn applications_key(context: &str, namespace: &str) -> String {
    format!("{}{}", applications_prefix(context), namespace)
}

/// Prefix covering every application list of a context
pub fn applications_prefix(context: &str) -> String {
    format!("applications:{}:", context)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with_clock() -> (TtlCache<String>, ManualClock) {
        let clock = ManualClock::new();
        (TtlCache::with_clock(Arc::new(clock.clone())), clock)
    }

    #[test]
    fn test_entry_valid_until_ttl_elapses() {
        let (cache, clock) = cache_with_clock();
        let ttl = Duration::from_secs(30);
        cache.insert("k", "v".to_string(), ttl);

        clock.advance(ttl - Duration::from_millis(1));
        assert_eq!(cache.get("k"), Some("v".to_string()));

        // Exactly at the boundary the entry is still valid
        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get("k"), Some("v".to_string()));

        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.stats().total_entries, 0, "stale entry should be evicted");
    }

    #[test]
    fn test_get_stale_ignores_expiry() {
        let (cache, clock) = cache_with_clock();
        cache.insert("k", "old".to_string(), Duration::from_secs(1));
        clock.advance(Duration::from_secs(5));

        assert_eq!(cache.get_stale("k"), Some("old".to_string()));
        assert_eq!(cache.stats().expired_entries, 1);
    }

    #[test]
    fn test_insert_replaces_and_resets_age() {
        let (cache, clock) = cache_with_clock();
        cache.insert("k", "first".to_string(), Duration::from_secs(10));
        clock.advance(Duration::from_secs(8));
        cache.insert("k", "second".to_string(), Duration::from_secs(10));
        clock.advance(Duration::from_secs(8));

        assert_eq!(cache.get("k"), Some("second".to_string()));
    }

    #[test]
    fn test_invalidate_prefix_leaves_other_contexts() {
        let cache: TtlCache<String> = TtlCache::new();
        let ttl = Duration::from_secs(30);
        cache.insert(applications_key("prod", "argocd"), "a".into(), ttl);
        cache.insert(applications_key("prod", "team-a"), "b".into(), ttl);
        cache.insert(applications_key("production", "argocd"), "c".into(), ttl);
        cache.insert(installation_key("prod"), "d".into(), ttl);

        assert_eq!(cache.invalidate_prefix(&applications_prefix("prod")), 2);
        assert!(cache.get(&applications_key("production", "argocd")).is_some());
        assert!(cache.get(&installation_key("prod")).is_some());
    }

    #[test]
    fn test_clones_share_storage() {
        let cache: TtlCache<u32> = TtlCache::new();
        let other = cache.clone();
        cache.insert("k", 7, Duration::from_secs(60));

        assert_eq!(other.get("k"), Some(7));
        assert!(other.invalidate("k"));
        assert!(!cache.invalidate("k"));
    }
}
