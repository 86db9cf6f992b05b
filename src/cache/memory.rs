//! Memory Store Module
//!
//! In-process [`CacheStore`] combining HashMap storage with LRU tracking and
//! sliding expiration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::store::with_cancellation;
use crate::cache::{
    CacheEntry, CacheStats, CacheStore, Clock, LruTracker, SystemClock, MAX_KEY_LENGTH,
    MAX_VALUE_SIZE,
};
use crate::error::{CacheError, Result};

// == Local Cache ==
/// Unsynchronised storage engine behind [`MemoryCacheStore`].
#[derive(Debug)]
struct LocalCache {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// LRU access tracker
    lru: LruTracker,
    /// Activity counters
    stats: CacheStats,
    /// Maximum number of entries allowed
    max_entries: usize,
}

impl LocalCache {
    fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            max_entries,
        }
    }

    fn set(&mut self, key: &str, value: Bytes, sliding: Duration, now_ms: u64) -> Result<()> {
        validate_key(key)?;

        if value.len() > MAX_VALUE_SIZE {
            return Err(CacheError::InvalidRequest(format!(
                "Value exceeds maximum size of {} bytes",
                MAX_VALUE_SIZE
            )));
        }

        if sliding.is_zero() {
            return Err(CacheError::InvalidRequest(
                "Sliding expiration must be positive".to_string(),
            ));
        }

        // If not overwriting and at capacity, evict the least recently used entry
        let is_overwrite = self.entries.contains_key(key);
        if !is_overwrite && self.entries.len() >= self.max_entries {
            match self.lru.evict_oldest() {
                Some(evicted_key) => {
                    self.entries.remove(&evicted_key);
                    self.stats.record_eviction();
                    debug!("Evicted least recently used key {}", evicted_key);
                }
                None => {
                    return Err(CacheError::CacheFull(
                        "Cache is full and eviction failed".to_string(),
                    ));
                }
            }
        }

        self.entries
            .insert(key.to_string(), CacheEntry::new(value, sliding, now_ms));
        self.lru.touch(key);
        self.stats.record_set();
        self.stats.set_total_entries(self.entries.len());

        Ok(())
    }

    fn get(&mut self, key: &str, now_ms: u64) -> Option<Bytes> {
        let live = self
            .entries
            .get(key)
            .map(|entry| !entry.is_expired(now_ms));

        match live {
            Some(true) => {
                let entry = self.entries.get_mut(key)?;
                entry.touch(now_ms);
                let value = entry.value.clone();
                self.stats.record_hit();
                self.lru.touch(key);
                return Some(value);
            }
            Some(false) => {
                self.entries.remove(key);
                self.lru.remove(key);
                self.stats.set_total_entries(self.entries.len());
            }
            None => {}
        }

        self.stats.record_miss();
        None
    }

    fn remove(&mut self, key: &str) -> bool {
        self.stats.record_removal();
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.lru.remove(key);
            self.stats.set_total_entries(self.entries.len());
        }
        removed
    }

    fn cleanup_expired(&mut self, now_ms: u64) -> usize {
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now_ms))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            self.entries.remove(key);
            self.lru.remove(key);
        }

        self.stats.set_total_entries(self.entries.len());
        expired_keys.len()
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidRequest("Key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidRequest(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}

// == Memory Cache Store ==
/// Bounded in-memory cache store.
///
/// Cloning is cheap and every clone shares the same entries, so one handle can
/// be given to the behaviors and another to the cleanup task.
#[derive(Debug, Clone)]
pub struct MemoryCacheStore {
    inner: Arc<RwLock<LocalCache>>,
    clock: Arc<dyn Clock>,
}

impl MemoryCacheStore {
    // == Constructor ==
    /// Creates a store holding at most `max_entries` entries, on the system clock.
    pub fn new(max_entries: usize) -> Self {
        Self::with_clock(max_entries, SystemClock)
    }

    /// Creates a store that reads time from `clock`.
    pub fn with_clock<C>(max_entries: usize, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        Self {
            inner: Arc::new(RwLock::new(LocalCache::new(max_entries))),
            clock: Arc::new(clock),
        }
    }

    // == Stats ==
    /// Returns a snapshot of the store counters.
    pub async fn stats(&self) -> CacheStats {
        let cache = self.inner.read().await;
        let mut stats = cache.stats.clone();
        stats.set_total_entries(cache.entries.len());
        stats
    }

    // == Cleanup Expired ==
    /// Removes all expired entries and returns how many were dropped.
    pub async fn cleanup_expired(&self) -> usize {
        let now_ms = self.clock.now_ms();
        self.inner.write().await.cleanup_expired(now_ms)
    }

    /// Remaining lifetime of a live entry, without refreshing it.
    pub async fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        let now_ms = self.clock.now_ms();
        let cache = self.inner.read().await;
        cache
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired(now_ms))
            .map(|entry| Duration::from_millis(entry.ttl_remaining_ms(now_ms)))
    }

    /// Time since a live entry was last written. Reads do not reset it.
    pub async fn age(&self, key: &str) -> Option<Duration> {
        let now_ms = self.clock.now_ms();
        let cache = self.inner.read().await;
        cache
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired(now_ms))
            .map(|entry| Duration::from_millis(entry.age_ms(now_ms)))
    }

    /// Returns the number of entries currently held, including expired ones
    /// not yet swept.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str, cancel: &CancellationToken) -> Result<Option<Bytes>> {
        with_cancellation(cancel, async {
            let now_ms = self.clock.now_ms();
            Ok(self.inner.write().await.get(key, now_ms))
        })
        .await
    }

    async fn set(
        &self,
        key: &str,
        value: Bytes,
        sliding_expiration: Duration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        with_cancellation(cancel, async {
            let now_ms = self.clock.now_ms();
            self.inner
                .write()
                .await
                .set(key, value, sliding_expiration, now_ms)
        })
        .await
    }

    async fn remove(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        with_cancellation(cancel, async {
            if !self.inner.write().await.remove(key) {
                debug!("Remove of absent key {}", key);
            }
            Ok(())
        })
        .await
    }
}
