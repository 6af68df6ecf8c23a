//! Generic resource cache.
//!
//! [`ResourceCache`] is a bounded, thread-safe map with per-entry TTL,
//! LRU/FIFO/LFU eviction and single-flight loading: concurrent
//! [`ResourceCache::get_or_load`] calls for one key run the loader once.
//! [`CacheSweeper`] purges expired entries in the background.

mod entry;
mod key;
mod resource_cache;
mod sweeper;
mod types;

pub use entry::{CacheEntry, EntryStatus};
pub use key::ResourceKey;
pub use resource_cache::{EvictionListener, ResourceCache};
pub use sweeper::{CacheSweeper, Sweep};
pub use types::{
    estimated_size, raster_bytes, CacheConfig, CacheStats, EvictionCause, EvictionStrategy,
    Weigh,
};
