//! File system watcher for the user pack directory.
//!
//! Watches the user root for packs being added, changed or removed and
//! triggers a callback (usually [`PackRegistry::reload`]) once the burst of
//! events has settled.

use crate::config::{PackConfig, WatcherConfig};
use crate::error::{PetpackError, Result};
use crate::registry::PackRegistry;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Callback type for when pack changes are detected.
pub type ChangeCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// Debounced watcher over a pack root.
pub struct PackWatcher {
    /// Dropping the debouncer closes the event channel.
    _debouncer: Debouncer<RecommendedWatcher>,
    root: PathBuf,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PackWatcher {
    /// Start watching `root`.
    ///
    /// * `debounce` - quiet period required after the last event before `on_change` fires
    pub fn new(root: impl AsRef<Path>, debounce: Duration, on_change: ChangeCallback) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let (event_tx, event_rx) = mpsc::channel::<DebounceEventResult>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let mut debouncer = new_debouncer(debounce, event_tx)
            .map_err(|e| PetpackError::Other(format!("Failed to create file watcher: {}", e)))?;
        debouncer
            .watcher()
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| PetpackError::Other(format!("Failed to watch {}: {}", root.display(), e)))?;

        info!("Started watching resource packs at {:?}", root);

        let handle = thread::Builder::new()
            .name("petpack-watcher".to_string())
            .spawn(move || {
                loop {
                    if stop_rx.try_recv().is_ok() {
                        break;
                    }

                    match event_rx.recv_timeout(WatcherConfig::POLL_INTERVAL) {
                        Ok(Ok(events)) => {
                            if events.iter().any(|event| is_relevant_path(&event.path)) {
                                debug!("Detected resource pack changes");
                                on_change();
                            }
                        }
                        Ok(Err(e)) => warn!("File watcher error: {}", e),
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => {
                            warn!("File watcher channel disconnected");
                            break;
                        }
                    }
                }
                debug!("File watcher stopping");
            })?;

        Ok(Self {
            _debouncer: debouncer,
            root,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Watch the registry's user root and reload the registry on change.
    pub fn for_registry(registry: Arc<PackRegistry>) -> Result<Self> {
        let root = registry.config().user_root.clone();
        Self::new(
            root,
            WatcherConfig::DEBOUNCE,
            Box::new(move || {
                if let Err(e) = registry.reload() {
                    warn!("Reload after pack change failed: {}", e);
                }
            }),
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stop the watcher and wait for its worker to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PackWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Excluded names (dotfiles, OS metadata) never trigger a reload.
fn is_relevant_path(path: &Path) -> bool {
    path.file_name()
        .map(|name| !PackConfig::is_excluded_name(&name.to_string_lossy()))
        .unwrap_or(true)
}
