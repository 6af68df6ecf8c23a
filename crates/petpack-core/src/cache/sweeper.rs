//! Background expiry sweeps.

use super::resource_cache::ResourceCache;
use super::types::Weigh;
use crate::error::{PetpackError, Result};
use std::fmt;
use std::hash::Hash;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info};

/// Something the sweeper can purge of expired entries.
pub trait Sweep: Send + Sync {
    fn label(&self) -> &str;

    /// Remove expired entries, returning how many went.
    fn sweep(&self) -> usize;
}

impl<K, V> Sweep for ResourceCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Display + Send + Sync,
    V: Clone + Weigh + Send + Sync,
{
    fn label(&self) -> &str {
        self.name()
    }

    fn sweep(&self) -> usize {
        self.cleanup()
    }
}

/// Periodically calls [`Sweep::sweep`] on a set of caches.
///
/// The worker thread stops when the sweeper is stopped or dropped.
pub struct CacheSweeper {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CacheSweeper {
    pub fn spawn(targets: Vec<Arc<dyn Sweep>>, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(PetpackError::Config {
                message: "sweep interval must be non-zero".to_string(),
            });
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("petpack-cache-sweeper".to_string())
            .spawn(move || {
                info!(caches = targets.len(), ?interval, "Cache sweeper started");
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {
                            for target in &targets {
                                let removed = target.sweep();
                                if removed > 0 {
                                    debug!(cache = target.label(), removed, "Sweep removed expired entries");
                                }
                            }
                        }
                    }
                }
                debug!("Cache sweeper stopped");
            })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Stop the worker and wait for it to exit.
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

impl Drop for CacheSweeper {
    fn drop(&mut self) {
        self.shutdown();
    }
}
