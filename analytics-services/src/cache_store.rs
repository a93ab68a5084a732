//! Cache Store
//!
//! Bounded in-memory key/value store with per-entry expiry. Every other
//! component reads and writes derived data through it.
//!
//! Entries live in a sharded map, so reads never block each other and a
//! write only contends with writers that hash to the same shard. Expired
//! entries are treated as misses and purged lazily on read or by the
//! background sweeper. When the total entry cost exceeds the capacity the
//! least recently used entries are evicted, regardless of their TTL.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use analytics_core::CacheConfig;

/// A cached value with its bookkeeping
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    ttl: Duration,
    cost: usize,
    /// Logical access time, used to pick LRU victims
    last_access: AtomicU64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= self.ttl
    }
}

/// Bounded TTL cache
pub struct CacheStore<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    capacity: usize,
    default_ttl: Duration,
    /// Sum of the costs of all live entries
    total_cost: AtomicUsize,
    /// Monotonic counter handed out on every read and write
    access_clock: AtomicU64,
    /// Serializes eviction passes against each other and against `clear`
    eviction: Mutex<()>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl<K, V> CacheStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a store with the given default TTL and capacity
    pub fn new(default_ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            default_ttl,
            total_cost: AtomicUsize::new(0),
            access_clock: AtomicU64::new(0),
            eviction: Mutex::new(()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    /// Create a store from the cache section of the service configuration
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl, config.max_entries)
    }

    fn tick(&self) -> u64 {
        self.access_clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Get a live value
    ///
    /// Never returns a value whose age has reached its TTL; such entries
    /// count as a miss and are removed.
    pub fn get(&self, key: &K) -> Option<V> {
        self.get_with_ttl(key).map(|(value, _)| value)
    }

    /// Get a live value together with the time it has left to live
    pub fn get_with_ttl(&self, key: &K) -> Option<(V, Duration)> {
        let now = Instant::now();

        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.last_access.store(self.tick(), Ordering::Relaxed);
                self.hits.fetch_add(1, Ordering::Relaxed);
                let remaining = entry.ttl.saturating_sub(now.saturating_duration_since(entry.created_at));
                return Some((entry.value.clone(), remaining));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            // Only drop it if no writer refreshed it in the meantime
            if let Some((_, removed)) = self
                .entries
                .remove_if(key, |_, entry| entry.is_expired(Instant::now()))
            {
                self.total_cost.fetch_sub(removed.cost, Ordering::AcqRel);
                self.expirations.fetch_add(1, Ordering::Relaxed);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert a value with unit cost
    pub fn set(&self, key: K, value: V, ttl: Duration) {
        self.set_weighted(key, value, ttl, 1);
    }

    /// Insert a value with an explicit cost
    ///
    /// Last writer wins; the TTL runs from this write. Values whose cost
    /// alone exceeds the capacity are not stored.
    pub fn set_weighted(&self, key: K, value: V, ttl: Duration, cost: usize) {
        if cost > self.capacity {
            debug!(
                "Skipping cache insert: cost {} exceeds capacity {}",
                cost, self.capacity
            );
            return;
        }

        let entry = CacheEntry {
            value,
            created_at: Instant::now(),
            ttl,
            cost,
            last_access: AtomicU64::new(self.tick()),
        };

        // Cost accounting happens while the shard lock is held so an
        // eviction can never subtract a cost before it was added.
        match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let previous = occupied.insert(entry);
                self.total_cost.fetch_add(cost, Ordering::AcqRel);
                self.total_cost.fetch_sub(previous.cost, Ordering::AcqRel);
            }
            Entry::Vacant(vacant) => {
                let _inserted = vacant.insert(entry);
                self.total_cost.fetch_add(cost, Ordering::AcqRel);
            }
        }

        if self.total_cost.load(Ordering::Acquire) > self.capacity {
            self.evict_to_capacity(&key);
        }
    }

    /// Evict least recently used entries until the store is within bound
    ///
    /// Expired entries are chosen before live ones. The entry just written
    /// is never its own victim.
    fn evict_to_capacity(&self, protect: &K) {
        let _guard = self.eviction.lock();

        if self.total_cost.load(Ordering::Acquire) <= self.capacity {
            return;
        }

        let now = Instant::now();
        let mut candidates: Vec<(bool, u64, K)> = self
            .entries
            .iter()
            .filter(|item| item.key() != protect)
            .map(|item| {
                let entry = item.value();
                (
                    !entry.is_expired(now),
                    entry.last_access.load(Ordering::Relaxed),
                    item.key().clone(),
                )
            })
            .collect();
        candidates.sort_by_key(|(live, access, _)| (*live, *access));

        let mut evicted = 0usize;
        for (_, _, key) in candidates {
            if self.total_cost.load(Ordering::Acquire) <= self.capacity {
                break;
            }
            if let Some((_, removed)) = self.entries.remove(&key) {
                self.total_cost.fetch_sub(removed.cost, Ordering::AcqRel);
                evicted += 1;
            }
        }

        if evicted > 0 {
            self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
            debug!("Evicted {} cache entries to stay within capacity {}", evicted, self.capacity);
        }
    }

    /// Remove a single entry
    pub fn invalidate(&self, key: &K) -> bool {
        match self.entries.remove(key) {
            Some((_, removed)) => {
                self.total_cost.fetch_sub(removed.cost, Ordering::AcqRel);
                true
            }
            None => false,
        }
    }

    /// Remove every entry, returning how many were removed
    pub fn clear(&self) -> usize {
        let _guard = self.eviction.lock();

        let mut removed = 0usize;
        let mut removed_cost = 0usize;
        self.entries.retain(|_, entry| {
            removed += 1;
            removed_cost += entry.cost;
            false
        });
        self.total_cost.fetch_sub(removed_cost, Ordering::AcqRel);

        info!("Cleared {} cache entries", removed);
        removed
    }

    /// Drop every expired entry, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut purged = 0usize;
        let mut purged_cost = 0usize;

        self.entries.retain(|_, entry| {
            if entry.is_expired(now) {
                purged += 1;
                purged_cost += entry.cost;
                false
            } else {
                true
            }
        });

        if purged > 0 {
            self.total_cost.fetch_sub(purged_cost, Ordering::AcqRel);
            self.expirations.fetch_add(purged as u64, Ordering::Relaxed);
        }
        purged
    }

    /// Number of stored entries (expired ones not yet purged included)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Sum of the costs of stored entries
    pub fn total_cost(&self) -> usize {
        self.total_cost.load(Ordering::Acquire)
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            capacity: self.capacity,
            ttl_secs: self.default_ttl.as_secs(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }
}

impl<K, V> CacheStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Start a background task that purges expired entries on an interval
    ///
    /// The task runs until the returned handle is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            info!("Starting cache sweeper with {:?} interval", every);
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let purged = store.purge_expired();
                if purged > 0 {
                    debug!("Cache sweeper purged {} expired entries", purged);
                }
            }
        })
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub ttl_secs: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}
