/// Bounded TTL cache for rendered results.
///
/// Entries are keyed by a fingerprint (SHA-256 hex of the canonical request
/// text), expire after a fixed TTL on the injected clock, and are evicted
/// oldest-first once the cache grows past its capacity. Values are shared
/// as `Arc`s so a hit never copies the payload.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::freshness::{Clock, has_expired};
use crate::logging::{self, DataSource};

pub const DEFAULT_CACHE_TTL_SECS: i64 = 1800;
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// SHA-256 of `canonical`, lowercase hex.
pub fn fingerprint(canonical: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

struct Entry<V> {
    value: Arc<V>,
    stored_at: DateTime<Utc>,
}

struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    /// Insertion order, oldest first. May hold keys already replaced.
    order: VecDeque<String>,
    stats: CacheStats,
}

pub struct ResultCache<V> {
    inner: Mutex<Inner<V>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    capacity: usize,
}

impl<V> ResultCache<V> {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                stats: CacheStats::default(),
            }),
            clock,
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// Fresh entry for `key`, if any. Counts a hit or a miss.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        let now = self.clock.now();
        let mut inner = self.lock();
        let fresh = inner
            .entries
            .get(key)
            .filter(|e| !has_expired(e.stored_at, self.ttl, now))
            .map(|e| Arc::clone(&e.value));
        match fresh {
            Some(_) => inner.stats.hits += 1,
            None => inner.stats.misses += 1,
        }
        fresh
    }

    /// Stores `value` under `key` and evicts the oldest entries past
    /// capacity. Returns the stored `Arc`.
    pub fn insert(&self, key: &str, value: V) -> Arc<V> {
        let now = self.clock.now();
        let value = Arc::new(value);
        let mut inner = self.lock();
        inner.entries.insert(
            key.to_string(),
            Entry {
                value: Arc::clone(&value),
                stored_at: now,
            },
        );
        inner.order.retain(|k| k != key);
        inner.order.push_back(key.to_string());

        while inner.entries.len() > self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            if inner.entries.remove(&oldest).is_some() {
                inner.stats.evictions += 1;
                logging::debug(DataSource::Cache, Some(&oldest[..12.min(oldest.len())]), "evicted");
            }
        }
        inner.stats.entries = inner.entries.len();
        value
    }

    /// Cached value for `key`, or the result of `compute` stored and
    /// returned. `compute` runs outside the lock; errors are not cached.
    pub fn get_or_insert_with<E, F>(&self, key: &str, compute: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }
        let value = compute()?;
        Ok(self.insert(key, value))
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entries: inner.entries.len(),
            ..inner.stats
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<V>> {
        // entries stay consistent across a panicking holder
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
