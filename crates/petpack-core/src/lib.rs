//! Petpack Core - resource pack overlays and bounded caching for desktop pets.
//!
//! Packs are directories or `.zip` archives of assets (sprites, sounds,
//! text). A [`PackRegistry`] loads built-in and user packs, keeps an ordered
//! active list and resolves each relative path to the file shipped by the
//! highest-priority active pack. [`ResourceCache`] is a generic thread-safe
//! cache for decoded resources; [`AssetStore`] ties the two together.
//!
//! # Example
//!
//! ```rust,no_run
//! use petpack_core::{AssetStore, PackRegistry, RegistryConfig};
//! use std::sync::Arc;
//!
//! fn main() -> petpack_core::Result<()> {
//!     let config = RegistryConfig::new("/opt/pet/packs", "/home/me/.local/share/petpack/packs");
//!     let (registry, report) = PackRegistry::open(config)?;
//!     println!("{} packs loaded, {} skipped", report.loaded.len(), report.skipped.len());
//!
//!     let store = AssetStore::new(Arc::new(registry));
//!     if let Some(text) = store.load_text("dialog/greeting.txt")? {
//!         println!("{}", text);
//!     }
//!     Ok(())
//! }
//! ```

pub mod assets;
pub mod cache;
pub mod config;
pub mod error;
pub mod pack;
pub mod persist;
pub mod registry;
pub mod watcher;

mod sync;

// Re-export commonly used types
pub use assets::AssetStore;
pub use cache::{
    CacheConfig, CacheStats, CacheSweeper, EvictionCause, EvictionStrategy, ResourceCache,
    ResourceKey, Weigh,
};
pub use config::{CacheDefaults, PackConfig, RegistryConfig, WatcherConfig};
pub use error::{PetpackError, Result};
pub use pack::{ContentLocator, PackFormat, PackMetadata, PackSource, PackVersion, ResourcePack};
pub use registry::{InitReport, PackInfo, PackRegistry, SkippedPack};
pub use watcher::PackWatcher;
