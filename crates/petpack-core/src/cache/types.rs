//! Cache configuration, statistics and size estimation.

use crate::config::CacheDefaults;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Which entry to evict when a cache is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionStrategy {
    /// Least recently accessed first.
    #[default]
    Lru,
    /// Oldest insertion first.
    Fifo,
    /// Fewest accesses first; ties go to the least recently accessed.
    Lfu,
}

/// Why an entry left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionCause {
    /// Removed to make room for a new entry.
    Capacity,
    /// Outlived its time-to-live.
    Expired,
}

/// Configuration for one cache instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CacheConfig {
    /// Maximum number of ready entries.
    pub max_items: usize,
    /// Maximum summed estimated size of ready entries, in bytes.
    pub max_size_bytes: u64,
    /// TTL applied when a caller passes none. Zero means entries never expire.
    pub default_ttl: Duration,
    pub strategy: EvictionStrategy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_items: CacheDefaults::MAX_ITEMS,
            max_size_bytes: CacheDefaults::MAX_SIZE_BYTES,
            default_ttl: CacheDefaults::DEFAULT_TTL,
            strategy: EvictionStrategy::default(),
        }
    }
}

impl CacheConfig {
    /// Preset for decoded images: large budget, never expires.
    pub fn images() -> Self {
        Self {
            max_items: CacheDefaults::IMAGE_MAX_ITEMS,
            max_size_bytes: CacheDefaults::IMAGE_MAX_SIZE_BYTES,
            default_ttl: Duration::ZERO,
            strategy: EvictionStrategy::Lru,
        }
    }

    /// Preset for text and JSON documents.
    pub fn text() -> Self {
        Self {
            max_items: CacheDefaults::TEXT_MAX_ITEMS,
            max_size_bytes: CacheDefaults::TEXT_MAX_SIZE_BYTES,
            ..Self::default()
        }
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    pub fn with_max_size_bytes(mut self, max_size_bytes: u64) -> Self {
        self.max_size_bytes = max_size_bytes;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_strategy(mut self, strategy: EvictionStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Snapshot of a cache's occupancy and counters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub name: String,
    /// Ready entries.
    pub items: usize,
    /// Entries whose loader is still running.
    pub loading: usize,
    pub size_bytes: u64,
    pub max_items: usize,
    pub max_size_bytes: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub load_failures: u64,
    /// Values too large to ever fit, returned but not stored.
    pub rejected: u64,
    pub last_cleanup: Option<DateTime<Utc>>,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

/// Advisory size estimate used for the byte budget.
///
/// Returning `None` charges [`CacheDefaults::FALLBACK_ENTRY_SIZE`]. Estimates
/// only shape eviction pressure; they never affect returned values.
pub trait Weigh {
    fn weigh(&self) -> Option<u64> {
        None
    }
}

/// Estimated size of a value, falling back to the fixed default.
pub fn estimated_size<V: Weigh + ?Sized>(value: &V) -> u64 {
    value.weigh().unwrap_or(CacheDefaults::FALLBACK_ENTRY_SIZE)
}

/// Bytes taken by an RGBA raster of the given dimensions.
pub fn raster_bytes(width: u32, height: u32) -> u64 {
    u64::from(width) * u64::from(height) * 4
}

impl Weigh for Vec<u8> {
    fn weigh(&self) -> Option<u64> {
        Some(self.len() as u64)
    }
}

impl Weigh for [u8] {
    fn weigh(&self) -> Option<u64> {
        Some(self.len() as u64)
    }
}

impl Weigh for bytes::Bytes {
    fn weigh(&self) -> Option<u64> {
        Some(self.len() as u64)
    }
}

impl Weigh for String {
    fn weigh(&self) -> Option<u64> {
        self.as_str().weigh()
    }
}

impl Weigh for str {
    fn weigh(&self) -> Option<u64> {
        Some(self.len() as u64 * 2)
    }
}

impl Weigh for serde_json::Value {}

impl<T: Weigh + ?Sized> Weigh for Arc<T> {
    fn weigh(&self) -> Option<u64> {
        (**self).weigh()
    }
}

impl<T: Weigh + ?Sized> Weigh for Box<T> {
    fn weigh(&self) -> Option<u64> {
        (**self).weigh()
    }
}
