//! Bounded result cache with TTL and LRU eviction

use crate::clock::TimeSource;

use dashmap::DashMap;
use parking_lot::Mutex;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    last_used: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) > self.ttl
    }
}

/// Bounded key-value cache for call results.
///
/// Entries expire `ttl` after insertion and are evicted lazily on lookup;
/// there is no background sweeper. When the cache is full, inserting a new
/// key evicts the least-recently-used entry first. A `get` never returns a
/// value whose TTL has elapsed as observed at call time.
///
/// Lookups go straight to the concurrent map; the insert/evict path is
/// serialized by a small mutex so the entry count never exceeds
/// `max_entries`.
///
/// # Examples
///
/// ```
/// use callguard::{MonotonicClock, ResultCache};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let cache = ResultCache::new(16, Duration::from_secs(60), Arc::new(MonotonicClock));
/// cache.put("user:42".to_string(), 7u32);
/// assert_eq!(cache.get(&"user:42".to_string()), Some(7));
/// ```
pub struct ResultCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    entries: DashMap<K, CacheEntry<V>>,
    write_lock: Mutex<()>,
    max_entries: usize,
    default_ttl: Duration,
    clock: Arc<dyn TimeSource>,
}

impl<K, V> ResultCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache holding at most `max_entries` values.
    ///
    /// A `max_entries` of zero disables caching: every `get` misses and
    /// every `put` is a no-op.
    pub fn new(max_entries: usize, default_ttl: Duration, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            entries: DashMap::new(),
            write_lock: Mutex::new(()),
            max_entries,
            default_ttl,
            clock,
        }
    }

    /// Look up a value; absent on miss or elapsed TTL.
    ///
    /// Expired entries are removed on lookup. A hit refreshes the entry's
    /// recency for LRU purposes.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        if let Some(mut entry) = self.entries.get_mut(key) {
            if entry.is_expired(now) {
                drop(entry);
                self.entries.remove(key);
                return None;
            }
            entry.last_used = now;
            return Some(entry.value.clone());
        }
        None
    }

    /// Insert or overwrite, evicting the least-recently-used entry first
    /// when at capacity.
    pub fn put(&self, key: K, value: V) {
        if self.max_entries == 0 {
            return;
        }
        let now = self.clock.now();
        let _guard = self.write_lock.lock();

        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.evict_lru();
        }
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
                last_used: now,
                ttl: self.default_ttl,
            },
        );
    }

    /// Drop the entry for `key`, if present.
    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    /// Number of entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_lru(&self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().last_used)
            .map(|entry| entry.key().clone());
        if let Some(key) = victim {
            self.entries.remove(&key);
        }
    }
}
