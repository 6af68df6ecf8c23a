//! Thread-safe in-memory cache with TTL, pluggable eviction and
//! single-flight loading.
//!
//! All table state lives behind one mutex. Loaders run with the mutex
//! released; concurrent callers for the same key park on a per-key latch
//! until the running load settles, then re-check the table.

use super::entry::CacheEntry;
use super::types::{estimated_size, CacheConfig, CacheStats, EvictionCause, EvictionStrategy, Weigh};
use crate::error::{BoxError, PetpackError, Result};
use crate::sync::mutex_lock;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

const LOCK_TARGET: &str = "cache";

/// Callback invoked, outside the table lock, for every evicted or expired entry.
pub type EvictionListener<K, V> = Arc<dyn Fn(&K, &V, EvictionCause) + Send + Sync>;

type Evicted<K, V> = Vec<(K, V, EvictionCause)>;

/// Released exactly once, when the load it belongs to settles.
struct LoadLatch {
    done: Mutex<bool>,
    settled: Condvar,
}

impl LoadLatch {
    fn new() -> Self {
        Self {
            done: Mutex::new(false),
            settled: Condvar::new(),
        }
    }

    fn wait(&self) {
        let mut done = self.done.lock().unwrap_or_else(PoisonError::into_inner);
        while !*done {
            done = self
                .settled
                .wait(done)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn release(&self) {
        let mut done = self.done.lock().unwrap_or_else(PoisonError::into_inner);
        *done = true;
        self.settled.notify_all();
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
    load_failures: u64,
    rejected: u64,
}

enum Lookup<V> {
    Hit(V),
    /// Another caller is loading this key.
    Pending(Arc<LoadLatch>),
    Miss,
    /// Miss, and this caller now owns the load.
    Claimed(Arc<LoadLatch>),
}

struct CacheState<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    /// One latch per in-flight load. A load may only publish its value while
    /// its own latch is still the one registered for the key.
    latches: HashMap<K, Arc<LoadLatch>>,
    ready_count: usize,
    size_bytes: u64,
    seq: u64,
    counters: Counters,
    last_cleanup: Option<DateTime<Utc>>,
}

impl<K, V> CacheState<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            latches: HashMap::new(),
            ready_count: 0,
            size_bytes: 0,
            seq: 0,
            counters: Counters::default(),
            last_cleanup: None,
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn lookup(&mut self, key: &K, now: Instant, claim: bool, evicted: &mut Evicted<K, V>) -> Lookup<V> {
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_ready() => {
                if let Some(latch) = self.latches.get(key) {
                    return Lookup::Pending(Arc::clone(latch));
                }
                false
            }
            Some(entry) => entry.is_expired_at(now),
            None => false,
        };

        if expired {
            self.expire(key, evicted);
        }

        let seq = self.next_seq();
        if let Some(entry) = self.entries.get_mut(key).filter(|e| e.is_ready()) {
            entry.access(now, seq);
            if let Some(value) = entry.value().cloned() {
                self.counters.hits += 1;
                return Lookup::Hit(value);
            }
        }

        self.counters.misses += 1;
        if !claim {
            return Lookup::Miss;
        }

        let latch = Arc::new(LoadLatch::new());
        self.remove_entry(key);
        self.entries.insert(key.clone(), CacheEntry::loading(now, seq));
        self.latches.insert(key.clone(), Arc::clone(&latch));
        Lookup::Claimed(latch)
    }

    fn remove_entry(&mut self, key: &K) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        if entry.is_ready() {
            self.ready_count -= 1;
            self.size_bytes -= entry.size_bytes();
        }
        Some(entry)
    }

    fn expire(&mut self, key: &K, evicted: &mut Evicted<K, V>) {
        if let Some(value) = self.remove_entry(key).and_then(CacheEntry::into_value) {
            self.counters.expirations += 1;
            evicted.push((key.clone(), value, EvictionCause::Expired));
        }
    }

    fn owns_load(&self, key: &K, latch: &Arc<LoadLatch>) -> bool {
        self.latches
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, latch))
    }

    #[allow(clippy::too_many_arguments)]
    fn finish_load(
        &mut self,
        key: &K,
        latch: &Arc<LoadLatch>,
        value: V,
        max_age: Duration,
        size: u64,
        config: &CacheConfig,
        now: Instant,
        evicted: &mut Evicted<K, V>,
    ) -> bool {
        // Removed or cleared while loading: hand the value back uncached.
        if !self.owns_load(key, latch) {
            return false;
        }
        self.latches.remove(key);
        self.insert_ready(key.clone(), value, max_age, size, config, now, evicted)
    }

    fn abort_load(&mut self, key: &K, latch: &Arc<LoadLatch>) {
        self.counters.load_failures += 1;
        if !self.owns_load(key, latch) {
            return;
        }
        self.latches.remove(key);
        if self.entries.get(key).is_some_and(|e| !e.is_ready()) {
            self.entries.remove(key);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn insert_ready(
        &mut self,
        key: K,
        value: V,
        max_age: Duration,
        size: u64,
        config: &CacheConfig,
        now: Instant,
        evicted: &mut Evicted<K, V>,
    ) -> bool {
        if let Some(old) = self.remove_entry(&key) {
            // A placeholder for a load still in flight is put back so that
            // waiters keep parking on the latch until it settles.
            if !old.is_ready() && self.latches.contains_key(&key) {
                self.entries.insert(key.clone(), old);
            }
        }

        if config.max_items == 0 || size > config.max_size_bytes {
            self.counters.rejected += 1;
            return false;
        }

        while self.ready_count >= config.max_items
            || self.size_bytes + size > config.max_size_bytes
        {
            let Some((victim, cause)) = self.pick_victim(config.strategy, now) else {
                break;
            };
            if let Some(value) = self.remove_entry(&victim).and_then(CacheEntry::into_value) {
                match cause {
                    EvictionCause::Capacity => self.counters.evictions += 1,
                    EvictionCause::Expired => self.counters.expirations += 1,
                }
                evicted.push((victim, value, cause));
            }
        }

        let seq = self.next_seq();
        self.entries
            .insert(key, CacheEntry::ready(value, max_age, size, now, seq));
        self.ready_count += 1;
        self.size_bytes += size;
        true
    }

    /// Expired entries go first, oldest first. Otherwise the strategy picks
    /// among ready entries. Loading placeholders are never candidates.
    fn pick_victim(&self, strategy: EvictionStrategy, now: Instant) -> Option<(K, EvictionCause)> {
        let expired = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired_at(now))
            .min_by_key(|(_, e)| e.fifo_rank());
        if let Some((key, _)) = expired {
            return Some((key.clone(), EvictionCause::Expired));
        }

        let ready = self.entries.iter().filter(|(_, e)| e.is_ready());
        let victim = match strategy {
            EvictionStrategy::Lru => ready.min_by_key(|(_, e)| e.lru_rank()),
            EvictionStrategy::Fifo => ready.min_by_key(|(_, e)| e.fifo_rank()),
            EvictionStrategy::Lfu => ready.min_by_key(|(_, e)| e.lfu_rank()),
        };
        victim.map(|(key, _)| (key.clone(), EvictionCause::Capacity))
    }

    fn remove_expired(&mut self, now: Instant, evicted: &mut Evicted<K, V>) -> usize {
        let expired: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired_at(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            self.expire(key, evicted);
        }
        expired.len()
    }
}

/// Generic keyed cache shared across threads.
///
/// Values are cloned out on every hit, so `V` is usually cheap to clone
/// (`Arc<_>`, `Bytes`).
pub struct ResourceCache<K, V> {
    name: String,
    config: CacheConfig,
    state: Mutex<CacheState<K, V>>,
    listener: Option<EvictionListener<K, V>>,
}

impl<K, V> fmt::Debug for ResourceCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCache")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<K, V> ResourceCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Display,
    V: Clone + Weigh,
{
    pub fn new(name: impl Into<String>, config: CacheConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(CacheState::new()),
            listener: None,
        }
    }

    /// Register a callback for entries leaving through eviction or expiry.
    pub fn with_eviction_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&K, &V, EvictionCause) + Send + Sync + 'static,
    {
        self.listener = Some(Arc::new(listener));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn lock(&self, op: &'static str) -> MutexGuard<'_, CacheState<K, V>> {
        mutex_lock(&self.state, LOCK_TARGET, op)
    }

    fn max_age(&self, ttl: Option<Duration>) -> Duration {
        ttl.unwrap_or(self.config.default_ttl)
    }

    fn notify(&self, evicted: Evicted<K, V>) {
        for (key, value, cause) in &evicted {
            trace!(cache = %self.name, key = %key, ?cause, "Cache entry evicted");
            if let Some(listener) = &self.listener {
                listener(key, value, *cause);
            }
        }
    }

    /// Return the value for `key` if present and fresh.
    ///
    /// Blocks while another caller is loading the key.
    pub fn get(&self, key: &K) -> Option<V> {
        loop {
            let mut evicted = Vec::new();
            let lookup = self
                .lock("get")
                .lookup(key, Instant::now(), false, &mut evicted);
            self.notify(evicted);

            match lookup {
                Lookup::Hit(value) => return Some(value),
                Lookup::Pending(latch) => latch.wait(),
                Lookup::Miss | Lookup::Claimed(_) => return None,
            }
        }
    }

    pub fn get_or(&self, key: &K, default: V) -> V {
        self.get(key).unwrap_or(default)
    }

    /// Whether a fresh value is cached, without touching access statistics.
    pub fn contains_key(&self, key: &K) -> bool {
        let now = Instant::now();
        self.lock("contains_key")
            .entries
            .get(key)
            .is_some_and(|e| e.is_ready() && !e.is_expired_at(now))
    }

    /// Return the cached value or run `loader` exactly once across all
    /// concurrent callers for `key`.
    ///
    /// `ttl` overrides the configured default; `Some(Duration::ZERO)` caches
    /// forever. A failed or panicking loader leaves the key absent, and
    /// callers that were waiting on it retry from scratch.
    pub fn get_or_load<F, E>(&self, key: &K, ttl: Option<Duration>, loader: F) -> Result<V>
    where
        F: FnOnce() -> std::result::Result<V, E>,
        E: Into<BoxError>,
    {
        let latch = loop {
            let mut evicted = Vec::new();
            let lookup = self
                .lock("get_or_load")
                .lookup(key, Instant::now(), true, &mut evicted);
            self.notify(evicted);

            match lookup {
                Lookup::Hit(value) => return Ok(value),
                Lookup::Pending(latch) => latch.wait(),
                Lookup::Claimed(latch) => break latch,
                Lookup::Miss => continue,
            }
        };

        let mut guard = LoadGuard {
            cache: self,
            key,
            latch,
            armed: true,
        };

        match loader() {
            Ok(value) => {
                guard.armed = false;
                self.complete_load(key, &guard.latch, value.clone(), ttl);
                Ok(value)
            }
            Err(err) => {
                let source: BoxError = err.into();
                warn!(cache = %self.name, key = %key, error = %source, "Cache loader failed");
                Err(PetpackError::CacheLoad {
                    key: key.to_string(),
                    source,
                })
            }
        }
    }

    fn complete_load(&self, key: &K, latch: &Arc<LoadLatch>, value: V, ttl: Option<Duration>) {
        let size = estimated_size(&value);
        let max_age = self.max_age(ttl);
        let mut evicted = Vec::new();
        let stored = self.lock("complete_load").finish_load(
            key,
            latch,
            value,
            max_age,
            size,
            &self.config,
            Instant::now(),
            &mut evicted,
        );
        latch.release();

        if !stored {
            debug!(cache = %self.name, key = %key, size, "Loaded value returned uncached");
        }
        self.notify(evicted);
    }

    fn abort_load(&self, key: &K, latch: &Arc<LoadLatch>) {
        self.lock("abort_load").abort_load(key, latch);
        latch.release();
    }

    /// Insert or replace a value. Returns false when the value can never
    /// fit the configured budget and was not stored.
    pub fn put(&self, key: K, value: V, ttl: Option<Duration>) -> bool {
        let size = estimated_size(&value);
        let max_age = self.max_age(ttl);
        let mut evicted = Vec::new();
        let stored = self.lock("put").insert_ready(
            key,
            value,
            max_age,
            size,
            &self.config,
            Instant::now(),
            &mut evicted,
        );

        if !stored {
            debug!(cache = %self.name, size, "Value exceeds cache budget, not stored");
        }
        self.notify(evicted);
        stored
    }

    /// Drop the entry for `key`. A load in flight for the key still returns
    /// its value to its callers but no longer publishes it.
    pub fn remove(&self, key: &K) -> bool {
        let mut state = self.lock("remove");
        state.latches.remove(key);
        state.remove_entry(key).is_some()
    }

    pub fn clear(&self) {
        let mut state = self.lock("clear");
        let dropped = state.entries.len();
        state.entries.clear();
        state.latches.clear();
        state.ready_count = 0;
        state.size_bytes = 0;
        debug!(cache = %self.name, dropped, "Cache cleared");
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let mut evicted = Vec::new();
        let removed = {
            let mut state = self.lock("cleanup");
            let removed = state.remove_expired(Instant::now(), &mut evicted);
            state.last_cleanup = Some(Utc::now());
            removed
        };
        if removed > 0 {
            debug!(cache = %self.name, removed, "Expired cache entries removed");
        }
        self.notify(evicted);
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock("stats");
        CacheStats {
            name: self.name.clone(),
            items: state.ready_count,
            loading: state.entries.len() - state.ready_count,
            size_bytes: state.size_bytes,
            max_items: self.config.max_items,
            max_size_bytes: self.config.max_size_bytes,
            hits: state.counters.hits,
            misses: state.counters.misses,
            evictions: state.counters.evictions,
            expirations: state.counters.expirations,
            load_failures: state.counters.load_failures,
            rejected: state.counters.rejected,
            last_cleanup: state.last_cleanup,
        }
    }

    /// Number of ready entries.
    pub fn len(&self) -> usize {
        self.lock("len").ready_count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn size_bytes(&self) -> u64 {
        self.lock("size_bytes").size_bytes
    }
}

/// Settles a claimed load if the loader errors or panics.
struct LoadGuard<'a, K, V>
where
    K: Eq + Hash + Clone + fmt::Display,
    V: Clone + Weigh,
{
    cache: &'a ResourceCache<K, V>,
    key: &'a K,
    latch: Arc<LoadLatch>,
    armed: bool,
}

impl<K, V> Drop for LoadGuard<'_, K, V>
where
    K: Eq + Hash + Clone + fmt::Display,
    V: Clone + Weigh,
{
    fn drop(&mut self) {
        if self.armed {
            self.cache.abort_load(self.key, &self.latch);
        }
    }
}
