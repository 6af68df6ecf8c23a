//! Centralized configuration for petpack.
//!
//! Constants for pack layout, cache defaults and watcher timing, plus the
//! runtime [`RegistryConfig`] that tells a registry where packs live.

use crate::error::{PetpackError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Pack layout conventions.
pub struct PackConfig;

impl PackConfig {
    pub const METADATA_FILENAME: &'static str = "pack.json";
    pub const ARCHIVE_EXTENSION: &'static str = "zip";
    pub const BUILTIN_ID_PREFIX: &'static str = "builtin.";
    pub const DEFAULT_VERSION: &'static str = "1.0.0";
    pub const STATE_FILENAME: &'static str = "active-packs.json";
    pub const APP_DIR_NAME: &'static str = "petpack";
    pub const USER_PACKS_DIR_NAME: &'static str = "packs";

    /// Directory and file names never exposed as pack content.
    pub const EXCLUDED_NAMES: &'static [&'static str] = &[
        ".git",
        ".svn",
        ".hg",
        "__pycache__",
        "__MACOSX",
        ".DS_Store",
        "Thumbs.db",
        "desktop.ini",
    ];

    /// Id fragments that mark a pack as a fallback default.
    pub const DEFAULT_ID_MARKERS: &'static [&'static str] = &["default", "classic"];

    /// Check whether a single path component should be skipped during scans.
    pub fn is_excluded_name(name: &str) -> bool {
        name.starts_with('.') || Self::EXCLUDED_NAMES.contains(&name)
    }

    /// Check whether an id looks like a default pack.
    pub fn looks_like_default(id: &str) -> bool {
        let lower = id.to_ascii_lowercase();
        Self::DEFAULT_ID_MARKERS
            .iter()
            .any(|marker| lower.contains(marker))
    }
}

/// Default cache sizing per resource category.
pub struct CacheDefaults;

impl CacheDefaults {
    pub const MAX_ITEMS: usize = 256;
    pub const MAX_SIZE_BYTES: u64 = 64 * 1024 * 1024; // 64MB
    pub const DEFAULT_TTL: Duration = Duration::from_secs(600);
    /// Size charged for values with no better estimate.
    pub const FALLBACK_ENTRY_SIZE: u64 = 1024;
    pub const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

    pub const IMAGE_MAX_ITEMS: usize = 512;
    pub const IMAGE_MAX_SIZE_BYTES: u64 = 256 * 1024 * 1024; // 256MB
    pub const TEXT_MAX_ITEMS: usize = 1024;
    pub const TEXT_MAX_SIZE_BYTES: u64 = 16 * 1024 * 1024; // 16MB
}

/// File watcher timing.
pub struct WatcherConfig;

impl WatcherConfig {
    pub const DEBOUNCE: Duration = Duration::from_millis(500);
    pub const POLL_INTERVAL: Duration = Duration::from_millis(100);
}

/// Where a [`PackRegistry`](crate::PackRegistry) finds its packs.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Root holding one folder per built-in pack.
    pub builtin_root: PathBuf,
    /// Root holding user pack folders and `.zip` archives.
    pub user_root: PathBuf,
    /// JSON file persisting the active pack ordering. `None` disables persistence.
    pub state_file: Option<PathBuf>,
}

impl RegistryConfig {
    /// Create a config with the state file placed next to the user packs.
    pub fn new(builtin_root: impl Into<PathBuf>, user_root: impl Into<PathBuf>) -> Self {
        let user_root = user_root.into();
        let state_file = user_root
            .parent()
            .map(|parent| parent.join(PackConfig::STATE_FILENAME));
        Self {
            builtin_root: builtin_root.into(),
            user_root,
            state_file,
        }
    }

    /// Use a specific state file for the active ordering.
    pub fn with_state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_file = Some(path.into());
        self
    }

    /// Disable persistence of the active ordering.
    pub fn without_state_file(mut self) -> Self {
        self.state_file = None;
        self
    }

    /// Build a config rooted at the platform data directory.
    ///
    /// # Platform Behavior
    /// - **Linux**: `~/.local/share/petpack/packs`
    /// - **Windows**: `%APPDATA%\petpack\packs`
    /// - **macOS**: `~/Library/Application Support/petpack/packs`
    pub fn for_platform(builtin_root: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(
            builtin_root.as_ref().to_path_buf(),
            Self::default_user_root()?,
        ))
    }

    /// Platform-standard user pack directory.
    pub fn default_user_root() -> Result<PathBuf> {
        let data_dir = dirs::data_dir().ok_or_else(|| PetpackError::Config {
            message: "Could not determine user data directory".to_string(),
        })?;
        Ok(data_dir
            .join(PackConfig::APP_DIR_NAME)
            .join(PackConfig::USER_PACKS_DIR_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excluded_names() {
        assert!(PackConfig::is_excluded_name(".git"));
        assert!(PackConfig::is_excluded_name(".hidden"));
        assert!(PackConfig::is_excluded_name("__pycache__"));
        assert!(PackConfig::is_excluded_name("Thumbs.db"));
        assert!(!PackConfig::is_excluded_name("icons"));
        assert!(!PackConfig::is_excluded_name("idle.png"));
    }

    #[test]
    fn test_default_markers() {
        assert!(PackConfig::looks_like_default("builtin.default"));
        assert!(PackConfig::looks_like_default("Classic-Cat"));
        assert!(!PackConfig::looks_like_default("winter.theme"));
    }

    #[test]
    fn test_state_file_next_to_user_root() {
        let config = RegistryConfig::new("/opt/petpack/builtin", "/home/me/petpack/packs");
        assert_eq!(
            config.state_file,
            Some(PathBuf::from("/home/me/petpack/active-packs.json"))
        );
        assert!(config.without_state_file().state_file.is_none());
    }
}
