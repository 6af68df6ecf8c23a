//! The merged virtual namespace over all active packs.

use crate::pack::{ContentLocator, ResourcePack};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;

/// Which pack provides a path, and where its bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayEntry {
    pub pack_id: Arc<str>,
    pub locator: ContentLocator,
}

/// Immutable snapshot of relative path → winning locator.
///
/// Always rebuilt from scratch; never patched in place.
#[derive(Debug, Default)]
pub struct Overlay {
    entries: BTreeMap<String, OverlayEntry>,
    generation: u64,
}

impl Overlay {
    /// Build the overlay for `active` (index 0 = highest priority).
    ///
    /// Packs are applied from lowest to highest priority so later writes
    /// shadow earlier ones. Ids without a loaded pack are ignored.
    pub fn build(active: &[String], packs: &HashMap<String, ResourcePack>, generation: u64) -> Self {
        let mut entries = BTreeMap::new();

        for id in active.iter().rev() {
            let Some(pack) = packs.get(id) else {
                continue;
            };
            let pack_id: Arc<str> = Arc::from(id.as_str());
            for (path, locator) in pack.files() {
                entries.insert(
                    path.to_string(),
                    OverlayEntry {
                        pack_id: Arc::clone(&pack_id),
                        locator: locator.clone(),
                    },
                );
            }
        }

        Self {
            entries,
            generation,
        }
    }

    pub fn get(&self, path: &str) -> Option<&OverlayEntry> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bumped on every rebuild.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Lazy iterator over overlay paths under a prefix, in sorted order.
///
/// Holds the snapshot it was created from; a fresh call to
/// [`PackRegistry::list_resources`](crate::PackRegistry::list_resources)
/// sees the current overlay.
pub struct ResourcePaths {
    overlay: Arc<Overlay>,
    prefix: String,
    cursor: Option<String>,
    done: bool,
}

impl ResourcePaths {
    pub(crate) fn new(overlay: Arc<Overlay>, prefix: &str) -> Self {
        let prefix = prefix
            .replace('\\', "/")
            .trim_start_matches("./")
            .trim_start_matches('/')
            .to_string();
        Self {
            overlay,
            prefix,
            cursor: None,
            done: false,
        }
    }
}

impl Iterator for ResourcePaths {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.done {
            return None;
        }

        let lower = match &self.cursor {
            Some(last) => Bound::Excluded(last.as_str()),
            None => Bound::Included(self.prefix.as_str()),
        };
        let next = self
            .overlay
            .entries
            .range::<str, _>((lower, Bound::Unbounded))
            .next()
            .map(|(path, _)| path.clone());

        match next {
            Some(path) if path.starts_with(&self.prefix) => {
                self.cursor = Some(path.clone());
                Some(path)
            }
            _ => {
                self.done = true;
                None
            }
        }
    }
}
