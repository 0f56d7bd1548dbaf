use crate::clock::Clock;
use crate::config::CacheConfig;
use chrono::{DateTime, Local, TimeDelta};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    saved_at: DateTime<Local>,
}

/// Bounded, time-expiring cache of model responses keyed by request
/// fingerprint.
///
/// Every operation takes the lock once, so a read-modify-write on a key is
/// atomic with respect to other callers. Misses are `None`, never errors.
pub struct ResponseCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl: TimeDelta::seconds(config.ttl_secs as i64),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Local>) -> bool {
        now - entry.saved_at < self.ttl
    }

    /// Look up `key`, promoting it to most-recently-used. An expired entry
    /// is removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        let mut entries = self.lock();
        let entry = entries.get(key)?;
        if self.is_fresh(entry, now) {
            return Some(entry.value.clone());
        }
        debug!(
            "response cache entry expired (age {}s)",
            (now - entry.saved_at).num_seconds()
        );
        entries.pop(key);
        None
    }

    /// Store `value` under `key`, evicting the least-recently-used entry if
    /// the cache is full.
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) {
        let entry = CacheEntry {
            value: value.into(),
            saved_at: self.clock.now(),
        };
        let mut entries = self.lock();
        if let Some((evicted, _)) = entries.push(key.into(), entry)
            && !entries.contains(&evicted)
        {
            debug!("response cache evicted least-recently-used entry");
        }
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();
        let stale: Vec<String> = entries
            .iter()
            .filter(|(_, e)| !self.is_fresh(e, now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &stale {
            entries.pop(key);
        }
        stale.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
