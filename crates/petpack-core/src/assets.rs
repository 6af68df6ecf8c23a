//! Cached access to resolved pack resources.
//!
//! [`AssetStore`] pairs a [`PackRegistry`] with one cache per decoded form
//! (raw bytes, UTF-8 text, JSON). Every lookup resolves against one overlay
//! snapshot and keys its cache entry with that snapshot's generation, so a
//! value read under an older overlay is never served for a newer one. Caches
//! are also cleared on the first lookup after the overlay changes.

use crate::cache::{CacheConfig, CacheStats, CacheSweeper, ResourceCache, ResourceKey, Sweep};
use crate::error::{PetpackError, Result};
use crate::pack::ContentLocator;
use crate::registry::PackRegistry;
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Key parameter holding the overlay generation a value was read under.
const GENERATION_PARAM: &str = "overlay";

pub struct AssetStore {
    registry: Arc<PackRegistry>,
    bytes: Arc<ResourceCache<ResourceKey, Bytes>>,
    text: Arc<ResourceCache<ResourceKey, Arc<str>>>,
    json: Arc<ResourceCache<ResourceKey, Arc<serde_json::Value>>>,
    seen_generation: AtomicU64,
}

impl AssetStore {
    pub fn new(registry: Arc<PackRegistry>) -> Self {
        Self::with_configs(registry, CacheConfig::default(), CacheConfig::text())
    }

    /// `bytes_config` sizes the raw byte cache, `text_config` the text and JSON caches.
    pub fn with_configs(
        registry: Arc<PackRegistry>,
        bytes_config: CacheConfig,
        text_config: CacheConfig,
    ) -> Self {
        let seen_generation = AtomicU64::new(registry.generation());
        Self {
            registry,
            bytes: Arc::new(ResourceCache::new("bytes", bytes_config)),
            text: Arc::new(ResourceCache::new("text", text_config.clone())),
            json: Arc::new(ResourceCache::new("json", text_config)),
            seen_generation,
        }
    }

    pub fn registry(&self) -> &Arc<PackRegistry> {
        &self.registry
    }

    /// Clear every cache if the overlay changed since the last lookup.
    fn sync_generation(&self, current: u64) {
        let seen = self.seen_generation.swap(current, Ordering::SeqCst);
        if seen != current {
            debug!(from = seen, to = current, "Overlay changed, clearing asset caches");
            self.clear();
        }
    }

    /// Resolve `path` against a single overlay snapshot.
    fn lookup(&self, path: &str) -> Option<(ResourceKey, ContentLocator)> {
        let overlay = self.registry.overlay();
        self.sync_generation(overlay.generation());
        let key = ResourceKey::new(path).with_param(GENERATION_PARAM, overlay.generation());
        let locator = overlay.get(key.path())?.locator.clone();
        Some((key, locator))
    }

    /// Raw bytes of the winning file for `path`, or `None` if no active pack ships it.
    pub fn load_bytes(&self, path: &str) -> Result<Option<Bytes>> {
        let Some((key, locator)) = self.lookup(path) else {
            return Ok(None);
        };
        self.bytes
            .get_or_load(&key, None, || locator.read().map(Bytes::from))
            .map(Some)
    }

    /// The resource decoded as UTF-8.
    pub fn load_text(&self, path: &str) -> Result<Option<Arc<str>>> {
        let Some((key, locator)) = self.lookup(path) else {
            return Ok(None);
        };
        self.text
            .get_or_load(&key, None, || {
                let raw = locator.read()?;
                String::from_utf8(raw).map(Arc::from).map_err(|e| {
                    PetpackError::read(key.path(), "not valid UTF-8", Some(Box::new(e)))
                })
            })
            .map(Some)
    }

    /// The resource parsed as JSON.
    pub fn load_json(&self, path: &str) -> Result<Option<Arc<serde_json::Value>>> {
        let Some((key, locator)) = self.lookup(path) else {
            return Ok(None);
        };
        self.json
            .get_or_load(&key, None, || {
                let raw = locator.read()?;
                serde_json::from_slice(&raw).map(Arc::new).map_err(|e| {
                    PetpackError::read(key.path(), "not valid JSON", Some(Box::new(e)))
                })
            })
            .map(Some)
    }

    /// Drop every cached form of `path`.
    pub fn invalidate(&self, path: &str) {
        let key = ResourceKey::new(path).with_param(GENERATION_PARAM, self.registry.generation());
        self.bytes.remove(&key);
        self.text.remove(&key);
        self.json.remove(&key);
    }

    pub fn clear(&self) {
        self.bytes.clear();
        self.text.clear();
        self.json.clear();
    }

    pub fn stats(&self) -> Vec<CacheStats> {
        vec![self.bytes.stats(), self.text.stats(), self.json.stats()]
    }

    /// Start a background sweeper over all three caches.
    pub fn spawn_sweeper(&self, interval: Duration) -> Result<CacheSweeper> {
        let targets: Vec<Arc<dyn Sweep>> = vec![
            self.bytes.clone() as Arc<dyn Sweep>,
            self.text.clone() as Arc<dyn Sweep>,
            self.json.clone() as Arc<dyn Sweep>,
        ];
        CacheSweeper::spawn(targets, interval)
    }
}
