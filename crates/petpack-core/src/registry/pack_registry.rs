//! Pack registry: loaded packs, the active priority list, and the overlay.

use super::overlay::{Overlay, ResourcePaths};
use super::state::ActivePacksState;
use crate::config::{PackConfig, RegistryConfig};
use crate::error::{PetpackError, Result};
use crate::pack::{normalize_path, ContentLocator, PackFormat, PackSource, ResourcePack};
use crate::sync::{rw_read, rw_write};
use arc_swap::ArcSwap;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

const SOURCE: &str = "registry::pack_registry";

/// Summary of a loaded pack.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackInfo {
    pub id: String,
    pub name: String,
    pub version: String,
    pub format: u8,
    pub source: PackSource,
    pub root: PathBuf,
    pub file_count: usize,
    /// Position in the active list (0 = highest), `None` when inactive.
    pub priority: Option<usize>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

/// A pack that failed to load during initialization.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedPack {
    pub path: PathBuf,
    pub kind: &'static str,
    pub reason: String,
}

/// Outcome of [`PackRegistry::initialize`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct InitReport {
    pub loaded: Vec<String>,
    pub skipped: Vec<SkippedPack>,
    pub active: Vec<String>,
}

#[derive(Default)]
struct RegistryInner {
    packs: HashMap<String, ResourcePack>,
    active: Vec<String>,
    /// Packs loaded through `add_pack`, re-read on every reload.
    added: Vec<(PathBuf, PackSource)>,
}

/// Owns every loaded pack and resolves paths through the active overlay.
///
/// Structural changes (`add_pack`, `remove`, `activate`, `deactivate`,
/// `set_priority`, `reload`) take the registry lock, rebuild the overlay from
/// scratch and swap it in. Lookups read the current overlay snapshot without
/// locking.
pub struct PackRegistry {
    config: RegistryConfig,
    inner: RwLock<RegistryInner>,
    overlay: ArcSwap<Overlay>,
    generation: AtomicU64,
}

impl PackRegistry {
    /// Create an empty registry. Call [`initialize`](Self::initialize) to load packs.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(RegistryInner::default()),
            overlay: ArcSwap::from_pointee(Overlay::default()),
            generation: AtomicU64::new(0),
        }
    }

    /// Create a registry and load its packs.
    pub fn open(config: RegistryConfig) -> Result<(Self, InitReport)> {
        let registry = Self::new(config);
        let report = registry.initialize()?;
        Ok((registry, report))
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Load built-in packs, user packs and packs added at runtime, then
    /// select the active list.
    ///
    /// Packs that fail to load are skipped and reported. Fails only when
    /// candidates exist but none of them loads.
    pub fn initialize(&self) -> Result<InitReport> {
        let mut report = InitReport::default();
        let mut packs: HashMap<String, ResourcePack> = HashMap::new();
        let mut load_order: Vec<String> = Vec::new();

        let mut candidates: Vec<ResourcePack> = list_entries(&self.config.builtin_root)
            .into_iter()
            .filter(|path| path.is_dir())
            .map(ResourcePack::builtin)
            .collect();
        candidates.extend(
            list_entries(&self.config.user_root)
                .iter()
                .filter_map(|path| ResourcePack::detect(path)),
        );

        let scanned: Vec<PathBuf> = candidates.iter().map(|p| p.root().to_path_buf()).collect();
        let known = rw_read(&self.inner, SOURCE, "initialize").added.clone();
        let added: Vec<(PathBuf, PackSource)> = known
            .iter()
            .filter(|(root, _)| !scanned.contains(root))
            .filter(|(root, _)| {
                let exists = root.exists();
                if !exists {
                    debug!("Added pack at {} is gone; forgetting it", root.display());
                }
                exists
            })
            .cloned()
            .collect();
        let candidate_count = candidates.len() + added.len();

        for mut pack in candidates {
            if self.load_candidate(&mut pack, &mut report) {
                merge_pack(&mut packs, &mut load_order, pack);
            }
        }
        for (root, source) in &added {
            let mut pack = ResourcePack::new(root, *source);
            if self.load_candidate(&mut pack, &mut report) {
                insert_pack(&mut packs, &mut load_order, pack);
            }
        }

        if candidate_count > 0 && packs.is_empty() {
            return Err(PetpackError::load(
                &self.config.user_root,
                format!("None of {} resource packs could be loaded", candidate_count),
                None,
            ));
        }

        let mut inner = rw_write(&self.inner, SOURCE, "initialize");

        // Reconcile with add_pack/remove calls made while the scan ran.
        let previous = std::mem::take(&mut inner.packs);
        for (root, _) in inner.added.iter().filter(|entry| !known.contains(entry)) {
            if let Some(pack) = previous.values().find(|p| p.root() == root.as_path()) {
                insert_pack(&mut packs, &mut load_order, pack.clone());
            }
        }
        for (root, _) in added.iter().filter(|entry| !inner.added.contains(entry)) {
            packs.retain(|_, p| p.root() != root.as_path());
        }
        load_order.retain(|id| packs.contains_key(id));
        inner
            .added
            .retain(|(root, _)| root.exists() && !scanned.contains(root));

        let preferred = if inner.active.is_empty() {
            self.load_persisted_active().unwrap_or_default()
        } else {
            inner.active.clone()
        };
        let active = select_active(preferred, &packs, &load_order);

        report.loaded = load_order;
        report.active = active.clone();

        inner.packs = packs;
        inner.active = active;
        self.commit(&inner);

        info!(
            "Initialized pack registry: {} loaded, {} skipped, {} active",
            report.loaded.len(),
            report.skipped.len(),
            inner.active.len()
        );

        Ok(report)
    }

    /// Re-scan both roots and re-read packs added at runtime. The active
    /// ordering is carried over.
    pub fn reload(&self) -> Result<InitReport> {
        self.initialize()
    }

    /// Load a pack at runtime and add it to the registry.
    ///
    /// A pack with the same id is replaced. Packs outside the two roots are
    /// remembered and survive [`reload`](Self::reload). Returns the pack id.
    pub fn add_pack(&self, path: impl Into<PathBuf>, source: PackSource) -> Result<String> {
        let mut pack = ResourcePack::new(path, source);
        pack.load()?;
        let id = pack.id().map(str::to_string).unwrap_or_default();
        let root = pack.root().to_path_buf();

        let mut inner = rw_write(&self.inner, SOURCE, "add_pack");
        if let Some(old) = inner.packs.insert(id.clone(), pack) {
            let old_root = old.root().to_path_buf();
            inner.added.retain(|(r, _)| *r != old_root);
            info!("Replaced pack '{}'", id);
        } else {
            info!("Added pack '{}'", id);
        }
        if !self.is_under_roots(&root) {
            inner.added.push((root, source));
        }
        self.commit(&inner);
        Ok(id)
    }

    /// Drop a pack entirely. Returns `false` if it wasn't loaded.
    pub fn remove(&self, id: &str) -> bool {
        let mut inner = rw_write(&self.inner, SOURCE, "remove");
        let Some(pack) = inner.packs.remove(id) else {
            return false;
        };
        inner.added.retain(|(root, _)| root.as_path() != pack.root());
        inner.active.retain(|a| a != id);
        self.commit(&inner);
        info!("Removed pack '{}'", id);
        true
    }

    /// Make a pack active at the highest priority. No-op if already active.
    pub fn activate(&self, id: &str) -> Result<()> {
        let mut inner = rw_write(&self.inner, SOURCE, "activate");
        let pack = inner
            .packs
            .get(id)
            .ok_or_else(|| PetpackError::PackNotFound { id: id.to_string() })?;
        warn_missing_dependencies(pack, &inner.packs);

        if inner.active.iter().any(|a| a == id) {
            return Ok(());
        }
        inner.active.insert(0, id.to_string());
        self.commit(&inner);
        debug!("Activated pack '{}'", id);
        Ok(())
    }

    /// Remove a pack from the active list. Returns `false` if it wasn't active.
    pub fn deactivate(&self, id: &str) -> bool {
        let mut inner = rw_write(&self.inner, SOURCE, "deactivate");
        let Some(pos) = inner.active.iter().position(|a| a == id) else {
            return false;
        };
        inner.active.remove(pos);
        self.commit(&inner);
        debug!("Deactivated pack '{}'", id);
        true
    }

    /// Move a pack to `index` in the active list (clamped to the end).
    ///
    /// An inactive pack is activated at that position.
    pub fn set_priority(&self, id: &str, index: usize) -> Result<()> {
        let mut inner = rw_write(&self.inner, SOURCE, "set_priority");
        if !inner.packs.contains_key(id) {
            return Err(PetpackError::PackNotFound { id: id.to_string() });
        }
        inner.active.retain(|a| a != id);
        let index = index.min(inner.active.len());
        inner.active.insert(index, id.to_string());
        self.commit(&inner);
        debug!("Moved pack '{}' to priority {}", id, index);
        Ok(())
    }

    /// Rebuild the overlay from the current packs and active list.
    pub fn rebuild_overlay(&self) {
        let inner = rw_write(&self.inner, SOURCE, "rebuild_overlay");
        self.publish_overlay(&inner);
    }

    /// Locator of the highest-priority active file at `path`.
    pub fn resolve(&self, path: &str) -> Option<ContentLocator> {
        self.overlay
            .load()
            .get(&normalize_path(path))
            .map(|entry| entry.locator.clone())
    }

    /// Id of the pack currently providing `path`.
    pub fn provider(&self, path: &str) -> Option<String> {
        self.overlay
            .load()
            .get(&normalize_path(path))
            .map(|entry| entry.pack_id.to_string())
    }

    pub fn has_resource(&self, path: &str) -> bool {
        self.overlay.load().get(&normalize_path(path)).is_some()
    }

    /// Read the bytes for `path`. `Ok(None)` when no active pack provides it.
    pub fn read_content(&self, path: &str) -> Result<Option<Vec<u8>>> {
        match self.resolve(path) {
            Some(locator) => locator.read().map(Some),
            None => Ok(None),
        }
    }

    /// Paths under `prefix` in the current overlay, sorted.
    pub fn list_resources(&self, prefix: &str) -> ResourcePaths {
        ResourcePaths::new(self.overlay.load_full(), prefix)
    }

    /// Active pack ids, highest priority first.
    pub fn active(&self) -> Vec<String> {
        rw_read(&self.inner, SOURCE, "active").active.clone()
    }

    /// All loaded packs: active ones in priority order, then inactive by id.
    pub fn packs(&self) -> Vec<PackInfo> {
        let inner = rw_read(&self.inner, SOURCE, "packs");
        let mut infos: Vec<PackInfo> = inner
            .packs
            .values()
            .filter_map(|pack| pack_info(pack, &inner.active))
            .collect();
        infos.sort_by(|a, b| {
            let rank = |info: &PackInfo| info.priority.unwrap_or(usize::MAX);
            rank(a).cmp(&rank(b)).then_with(|| a.id.cmp(&b.id))
        });
        infos
    }

    pub fn pack_info(&self, id: &str) -> Option<PackInfo> {
        let inner = rw_read(&self.inner, SOURCE, "pack_info");
        inner
            .packs
            .get(id)
            .and_then(|pack| pack_info(pack, &inner.active))
    }

    pub fn contains_pack(&self, id: &str) -> bool {
        rw_read(&self.inner, SOURCE, "contains_pack")
            .packs
            .contains_key(id)
    }

    /// Number of paths in the current overlay.
    pub fn overlay_len(&self) -> usize {
        self.overlay.load().len()
    }

    /// The current overlay. A snapshot never changes once taken.
    pub fn overlay(&self) -> Arc<Overlay> {
        self.overlay.load_full()
    }

    /// Changes whenever the overlay is rebuilt.
    pub fn generation(&self) -> u64 {
        self.overlay.load().generation()
    }

    /// Load one candidate, recording a failure in the report.
    fn load_candidate(&self, pack: &mut ResourcePack, report: &mut InitReport) -> bool {
        match pack.load() {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    kind = e.kind(),
                    "Skipping pack at {}: {}",
                    pack.root().display(),
                    e
                );
                report.skipped.push(SkippedPack {
                    path: pack.root().to_path_buf(),
                    kind: e.kind(),
                    reason: e.to_string(),
                });
                false
            }
        }
    }

    /// Direct children of either root are found by the scan itself.
    fn is_under_roots(&self, path: &Path) -> bool {
        let parent = path.parent();
        parent == Some(self.config.builtin_root.as_path())
            || parent == Some(self.config.user_root.as_path())
    }

    fn commit(&self, inner: &RegistryInner) {
        self.publish_overlay(inner);
        self.persist_active(&inner.active);
    }

    fn publish_overlay(&self, inner: &RegistryInner) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let overlay = Overlay::build(&inner.active, &inner.packs, generation);
        debug!(
            paths = overlay.len(),
            active = inner.active.len(),
            generation,
            "Rebuilt resource overlay"
        );
        self.overlay.store(Arc::new(overlay));
    }

    fn persist_active(&self, active: &[String]) {
        let Some(path) = &self.config.state_file else {
            return;
        };
        if let Err(e) = ActivePacksState::new(active.to_vec()).save(path) {
            warn!("Failed to persist active packs to {}: {}", path.display(), e);
        }
    }

    fn load_persisted_active(&self) -> Option<Vec<String>> {
        let path = self.config.state_file.as_ref()?;
        match ActivePacksState::load(path) {
            Ok(state) => state.map(|s| s.active),
            Err(e) => {
                warn!("Ignoring unreadable pack state {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// Sorted entries of a pack root. A missing root yields nothing.
fn list_entries(root: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() == std::io::ErrorKind::NotFound {
                debug!("Pack root {} does not exist", root.display());
            } else {
                warn!("Failed to read pack root {}: {}", root.display(), e);
            }
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .map(|n| !PackConfig::is_excluded_name(&n.to_string_lossy()))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();
    paths
}

/// Insert a freshly loaded pack, resolving id collisions.
fn merge_pack(
    packs: &mut HashMap<String, ResourcePack>,
    load_order: &mut Vec<String>,
    pack: ResourcePack,
) {
    let Some(id) = pack.id().map(str::to_string) else {
        return;
    };

    match packs.get(&id) {
        Some(existing) if should_replace(existing, &pack) => {
            info!(
                "Pack '{}' from {} overrides {}",
                id,
                pack.root().display(),
                existing.root().display()
            );
            packs.insert(id, pack);
        }
        Some(existing) => {
            debug!(
                "Keeping pack '{}' from {}; ignoring {}",
                id,
                existing.root().display(),
                pack.root().display()
            );
        }
        None => {
            load_order.push(id.clone());
            packs.insert(id, pack);
        }
    }
}

/// Insert a pack added at runtime, replacing any pack with the same id.
fn insert_pack(
    packs: &mut HashMap<String, ResourcePack>,
    load_order: &mut Vec<String>,
    pack: ResourcePack,
) {
    let Some(id) = pack.id().map(str::to_string) else {
        return;
    };
    if packs.insert(id.clone(), pack).is_none() {
        load_order.push(id);
    }
}

/// User packs always replace built-ins; otherwise the newer version wins.
fn should_replace(existing: &ResourcePack, candidate: &ResourcePack) -> bool {
    match (existing.source(), candidate.source()) {
        (PackSource::Builtin, PackSource::Directory | PackSource::Archive) => true,
        (PackSource::Directory | PackSource::Archive, PackSource::Builtin) => false,
        _ => {
            candidate.metadata().map(|m| &m.version) > existing.metadata().map(|m| &m.version)
        }
    }
}

/// Keep known ids from `preferred`; fall back to a default-looking pack,
/// then to the first built-in.
fn select_active(
    preferred: Vec<String>,
    packs: &HashMap<String, ResourcePack>,
    load_order: &[String],
) -> Vec<String> {
    let mut active: Vec<String> = Vec::new();
    for id in preferred {
        if packs.contains_key(&id) && !active.contains(&id) {
            active.push(id);
        }
    }
    if !active.is_empty() {
        return active;
    }

    let fallback = load_order
        .iter()
        .find(|id| PackConfig::looks_like_default(id))
        .or_else(|| {
            load_order
                .iter()
                .find(|id| packs.get(*id).map(|p| p.source()) == Some(PackSource::Builtin))
        });

    match fallback {
        Some(id) => {
            debug!("No stored pack ordering; activating '{}'", id);
            active.push(id.clone());
        }
        None if !packs.is_empty() => warn!("No default pack found; nothing is active"),
        None => {}
    }
    active
}

fn warn_missing_dependencies(pack: &ResourcePack, packs: &HashMap<String, ResourcePack>) {
    let Some(meta) = pack.metadata() else {
        return;
    };
    if meta.format < PackFormat::Conditional {
        return;
    }
    for dep in meta.dependencies.iter().filter(|d| !packs.contains_key(*d)) {
        warn!("Pack '{}' depends on missing pack '{}'", meta.id, dep);
    }
}

fn pack_info(pack: &ResourcePack, active: &[String]) -> Option<PackInfo> {
    let meta = pack.metadata()?;
    Some(PackInfo {
        id: meta.id.clone(),
        name: meta.name.clone(),
        version: meta.version.to_string(),
        format: meta.format.as_number(),
        source: pack.source(),
        root: pack.root().to_path_buf(),
        file_count: pack.file_count(),
        priority: active.iter().position(|a| *a == meta.id),
        author: meta.author.clone(),
        description: meta.description.clone(),
        tags: meta.tags.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        builtin_root: PathBuf,
        user_root: PathBuf,
        state_file: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let builtin_root = temp.path().join("builtin");
            let user_root = temp.path().join("user").join("packs");
            std::fs::create_dir_all(&builtin_root).unwrap();
            std::fs::create_dir_all(&user_root).unwrap();
            let state_file = temp.path().join("user").join("active-packs.json");
            Self {
                _temp: temp,
                builtin_root,
                user_root,
                state_file,
            }
        }

        fn config(&self) -> RegistryConfig {
            RegistryConfig::new(&self.builtin_root, &self.user_root)
                .with_state_file(&self.state_file)
        }

        fn pack(&self, root: &Path, folder: &str, meta: Option<&str>, files: &[(&str, &str)]) {
            let dir = root.join(folder);
            std::fs::create_dir_all(&dir).unwrap();
            if let Some(meta) = meta {
                std::fs::write(dir.join("pack.json"), meta).unwrap();
            }
            for (path, data) in files {
                let path = dir.join(path);
                std::fs::create_dir_all(path.parent().unwrap()).unwrap();
                std::fs::write(path, data).unwrap();
            }
        }

        fn user_pack(&self, id: &str, version: &str, files: &[(&str, &str)]) {
            let meta = format!(r#"{{"id": "{}", "name": "{}", "version": "{}"}}"#, id, id, version);
            self.pack(&self.user_root, id, Some(&meta), files);
        }
    }

    fn read_str(registry: &PackRegistry, path: &str) -> Option<String> {
        registry
            .read_content(path)
            .unwrap()
            .map(|bytes| String::from_utf8(bytes).unwrap())
    }

    #[test]
    fn test_initialize_activates_default_pack() {
        let fx = Fixture::new();
        fx.pack(&fx.builtin_root, "default", None, &[("idle.png", "builtin")]);
        fx.user_pack("winter", "1.0", &[("idle.png", "winter")]);

        let (registry, report) = PackRegistry::open(fx.config()).unwrap();
        assert_eq!(report.loaded, vec!["builtin.default", "winter"]);
        assert_eq!(registry.active(), vec!["builtin.default"]);
        assert_eq!(read_str(&registry, "idle.png").as_deref(), Some("builtin"));
    }

    #[test]
    fn test_invalid_pack_is_skipped() {
        let fx = Fixture::new();
        fx.pack(&fx.builtin_root, "default", None, &[("idle.png", "builtin")]);
        fx.pack(&fx.user_root, "broken", Some(r#"{"name": "No id"}"#), &[("a.png", "x")]);
        fx.pack(&fx.user_root, "garbled", Some("{{{"), &[]);

        let (registry, report) = PackRegistry::open(fx.config()).unwrap();
        assert_eq!(report.skipped.len(), 2);
        assert!(report.skipped.iter().any(|s| s.kind == "validation"));
        assert!(report.skipped.iter().any(|s| s.kind == "load"));
        assert!(registry.contains_pack("builtin.default"));
        assert!(!registry.has_resource("a.png"));
    }

    #[test]
    fn test_all_packs_failing_is_error() {
        let fx = Fixture::new();
        fx.pack(&fx.user_root, "broken", Some(r#"{"id": ""}"#), &[]);
        assert!(PackRegistry::open(fx.config()).is_err());
    }

    #[test]
    fn test_empty_roots_initialize_cleanly() {
        let fx = Fixture::new();
        let (registry, report) = PackRegistry::open(fx.config()).unwrap();
        assert!(report.loaded.is_empty());
        assert!(registry.active().is_empty());
        assert_eq!(registry.overlay_len(), 0);
    }

    #[test]
    fn test_user_pack_overrides_builtin_with_same_id() {
        let fx = Fixture::new();
        fx.pack(
            &fx.builtin_root,
            "default",
            Some(r#"{"id": "cat.default", "name": "Cat", "version": "9.0"}"#),
            &[("idle.png", "builtin")],
        );
        fx.user_pack("cat.default", "0.1", &[("idle.png", "user")]);

        let (registry, _) = PackRegistry::open(fx.config()).unwrap();
        let info = registry.pack_info("cat.default").unwrap();
        assert_eq!(info.source, PackSource::Directory);
        assert_eq!(read_str(&registry, "idle.png").as_deref(), Some("user"));
    }

    #[test]
    fn test_newer_version_wins_between_user_packs() {
        let fx = Fixture::new();
        fx.pack(
            &fx.user_root,
            "a-old",
            Some(r#"{"id": "cat", "name": "Cat", "version": "1.10"}"#),
            &[("idle.png", "1.10")],
        );
        fx.pack(
            &fx.user_root,
            "b-older",
            Some(r#"{"id": "cat", "name": "Cat", "version": "1.9"}"#),
            &[("idle.png", "1.9")],
        );

        let (registry, _) = PackRegistry::open(fx.config()).unwrap();
        assert_eq!(registry.pack_info("cat").unwrap().version, "1.10");
    }

    #[test]
    fn test_activate_deactivate_and_priority() {
        let fx = Fixture::new();
        fx.pack(&fx.builtin_root, "default", None, &[("icons/a.png", "B1")]);
        fx.user_pack("overlay", "1", &[("icons/a.png", "B2"), ("icons/extra.png", "E")]);

        let (registry, _) = PackRegistry::open(fx.config()).unwrap();
        assert_eq!(read_str(&registry, "icons/a.png").as_deref(), Some("B1"));

        registry.activate("overlay").unwrap();
        assert_eq!(registry.active(), vec!["overlay", "builtin.default"]);
        assert_eq!(read_str(&registry, "icons/a.png").as_deref(), Some("B2"));
        assert_eq!(registry.provider("icons/a.png").as_deref(), Some("overlay"));

        registry.set_priority("overlay", 5).unwrap();
        assert_eq!(registry.active(), vec!["builtin.default", "overlay"]);
        assert_eq!(read_str(&registry, "icons/a.png").as_deref(), Some("B1"));
        assert!(registry.has_resource("icons/extra.png"));

        assert!(registry.deactivate("overlay"));
        assert!(!registry.deactivate("overlay"));
        assert_eq!(read_str(&registry, "icons/a.png").as_deref(), Some("B1"));
        assert!(!registry.has_resource("icons/extra.png"));
    }

    #[test]
    fn test_activate_unknown_pack() {
        let fx = Fixture::new();
        let (registry, _) = PackRegistry::open(fx.config()).unwrap();
        assert!(matches!(
            registry.activate("ghost"),
            Err(PetpackError::PackNotFound { .. })
        ));
        assert!(registry.set_priority("ghost", 0).is_err());
    }

    #[test]
    fn test_activate_twice_keeps_position() {
        let fx = Fixture::new();
        fx.pack(&fx.builtin_root, "default", None, &[("a.png", "d")]);
        fx.user_pack("extra", "1", &[("a.png", "e")]);

        let (registry, _) = PackRegistry::open(fx.config()).unwrap();
        registry.set_priority("extra", 1).unwrap();
        let generation = registry.generation();
        registry.activate("extra").unwrap();
        assert_eq!(registry.active(), vec!["builtin.default", "extra"]);
        assert_eq!(registry.generation(), generation);
    }

    #[test]
    fn test_remove_pack() {
        let fx = Fixture::new();
        fx.pack(&fx.builtin_root, "default", None, &[("a.png", "d")]);
        fx.user_pack("extra", "1", &[("b.png", "e")]);

        let (registry, _) = PackRegistry::open(fx.config()).unwrap();
        registry.activate("extra").unwrap();
        assert!(registry.remove("extra"));
        assert!(!registry.remove("extra"));
        assert_eq!(registry.active(), vec!["builtin.default"]);
        assert!(!registry.has_resource("b.png"));
    }

    #[test]
    fn test_active_ordering_persists_across_instances() {
        let fx = Fixture::new();
        fx.pack(&fx.builtin_root, "default", None, &[("a.png", "d")]);
        fx.user_pack("extra", "1", &[("a.png", "e")]);

        {
            let (registry, _) = PackRegistry::open(fx.config()).unwrap();
            registry.activate("extra").unwrap();
        }

        let (registry, report) = PackRegistry::open(fx.config()).unwrap();
        assert_eq!(report.active, vec!["extra", "builtin.default"]);
        assert_eq!(read_str(&registry, "a.png").as_deref(), Some("e"));
    }

    #[test]
    fn test_reload_keeps_ordering_without_state_file() {
        let fx = Fixture::new();
        fx.pack(&fx.builtin_root, "default", None, &[("a.png", "d")]);
        fx.user_pack("extra", "1", &[("a.png", "e")]);

        let registry = PackRegistry::new(fx.config().without_state_file());
        registry.initialize().unwrap();
        registry.activate("extra").unwrap();

        fx.user_pack("later", "1", &[("new.png", "n")]);
        let report = registry.reload().unwrap();
        assert!(report.loaded.contains(&"later".to_string()));
        assert_eq!(registry.active(), vec!["extra", "builtin.default"]);
        assert!(!registry.has_resource("new.png"));
    }

    #[test]
    fn test_add_pack_at_runtime() {
        let fx = Fixture::new();
        fx.pack(&fx.builtin_root, "default", None, &[("a.png", "d")]);
        let (registry, _) = PackRegistry::open(fx.config()).unwrap();

        let elsewhere = fx._temp.path().join("elsewhere");
        fx.pack(
            &elsewhere,
            "sideload",
            Some(r#"{"id": "sideload", "name": "Side"}"#),
            &[("a.png", "s")],
        );
        let id = registry
            .add_pack(elsewhere.join("sideload"), PackSource::Directory)
            .unwrap();
        assert_eq!(id, "sideload");
        registry.activate(&id).unwrap();
        assert_eq!(read_str(&registry, "a.png").as_deref(), Some("s"));
    }

    #[test]
    fn test_added_pack_survives_reload() {
        let fx = Fixture::new();
        fx.pack(&fx.builtin_root, "default", None, &[("a.png", "d")]);
        let (registry, _) = PackRegistry::open(fx.config()).unwrap();

        let elsewhere = fx._temp.path().join("elsewhere");
        fx.pack(
            &elsewhere,
            "sideload",
            Some(r#"{"id": "sideload", "name": "Side"}"#),
            &[("a.png", "s")],
        );
        let id = registry
            .add_pack(elsewhere.join("sideload"), PackSource::Directory)
            .unwrap();
        registry.activate(&id).unwrap();

        fx.user_pack("dropped-in", "1", &[("b.png", "b")]);
        let report = registry.reload().unwrap();
        assert!(report.loaded.contains(&"sideload".to_string()));
        assert!(registry.contains_pack("sideload"));
        assert_eq!(registry.active(), vec!["sideload", "builtin.default"]);
        assert_eq!(read_str(&registry, "a.png").as_deref(), Some("s"));

        let (restarted, _) = PackRegistry::open(fx.config()).unwrap();
        assert!(!restarted.contains_pack("sideload"));
    }

    #[test]
    fn test_removed_or_deleted_added_pack_is_forgotten() {
        let fx = Fixture::new();
        fx.pack(&fx.builtin_root, "default", None, &[("a.png", "d")]);
        let (registry, _) = PackRegistry::open(fx.config()).unwrap();

        let elsewhere = fx._temp.path().join("elsewhere");
        for id in ["one", "two"] {
            let meta = format!(r#"{{"id": "{}", "name": "{}"}}"#, id, id);
            fx.pack(&elsewhere, id, Some(&meta), &[("a.png", id)]);
            registry
                .add_pack(elsewhere.join(id), PackSource::Directory)
                .unwrap();
        }

        assert!(registry.remove("one"));
        std::fs::remove_dir_all(elsewhere.join("two")).unwrap();
        let report = registry.reload().unwrap();
        assert_eq!(report.loaded, vec!["builtin.default"]);
        assert!(report.skipped.is_empty());
        assert!(!registry.contains_pack("one"));
        assert!(!registry.contains_pack("two"));
    }

    #[test]
    fn test_packs_listing_order() {
        let fx = Fixture::new();
        fx.pack(&fx.builtin_root, "default", None, &[("a.png", "d")]);
        fx.user_pack("zeta", "1", &[]);
        fx.user_pack("alpha", "1", &[]);

        let (registry, _) = PackRegistry::open(fx.config()).unwrap();
        let ids: Vec<_> = registry.packs().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["builtin.default", "alpha", "zeta"]);
    }

    #[test]
    fn test_list_resources_reflects_current_overlay() {
        let fx = Fixture::new();
        fx.pack(&fx.builtin_root, "default", None, &[("icons/a.png", "d")]);
        fx.user_pack("extra", "1", &[("icons/b.png", "e")]);

        let (registry, _) = PackRegistry::open(fx.config()).unwrap();
        assert_eq!(registry.list_resources("icons/").count(), 1);
        registry.activate("extra").unwrap();
        let listed: Vec<_> = registry.list_resources("icons/").collect();
        assert_eq!(listed, vec!["icons/a.png", "icons/b.png"]);
    }
}
