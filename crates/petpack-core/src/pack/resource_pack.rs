//! A single resource pack: directory, zip archive, or built-in folder.

use super::locator::ContentLocator;
use super::metadata::PackMetadata;
use super::normalize_path;
use crate::config::PackConfig;
use crate::error::{PetpackError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Where a pack's files come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackSource {
    Directory,
    Archive,
    Builtin,
}

impl PackSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackSource::Directory => "directory",
            PackSource::Archive => "archive",
            PackSource::Builtin => "builtin",
        }
    }
}

impl fmt::Display for PackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view over one pack's files.
///
/// Created unloaded; [`load`](Self::load) parses metadata and enumerates the
/// files. After a successful load the pack never changes.
#[derive(Debug, Clone)]
pub struct ResourcePack {
    root: PathBuf,
    source: PackSource,
    metadata: Option<PackMetadata>,
    files: BTreeMap<String, ContentLocator>,
}

impl ResourcePack {
    pub fn new(root: impl Into<PathBuf>, source: PackSource) -> Self {
        Self {
            root: root.into(),
            source,
            metadata: None,
            files: BTreeMap::new(),
        }
    }

    pub fn directory(root: impl Into<PathBuf>) -> Self {
        Self::new(root, PackSource::Directory)
    }

    pub fn archive(path: impl Into<PathBuf>) -> Self {
        Self::new(path, PackSource::Archive)
    }

    pub fn builtin(root: impl Into<PathBuf>) -> Self {
        Self::new(root, PackSource::Builtin)
    }

    /// Classify a user-root entry: folders are directory packs, `.zip`
    /// files are archive packs, anything else is ignored.
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy();
        if PackConfig::is_excluded_name(&name) {
            return None;
        }
        if path.is_dir() {
            return Some(Self::directory(path));
        }
        let is_archive = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case(PackConfig::ARCHIVE_EXTENSION))
            .unwrap_or(false);
        if path.is_file() && is_archive {
            return Some(Self::archive(path));
        }
        None
    }

    /// Parse metadata and enumerate contents. Repeated calls after a
    /// successful load do nothing.
    pub fn load(&mut self) -> Result<()> {
        if self.is_loaded() {
            return Ok(());
        }

        let (metadata, files) = match self.source {
            PackSource::Directory | PackSource::Builtin => {
                let metadata = self.read_directory_metadata()?;
                (metadata, scan_directory(&self.root)?)
            }
            PackSource::Archive => load_archive(&self.root)?,
        };

        debug!(
            "Loaded {} pack '{}' ({} files) from {}",
            self.source,
            metadata.id,
            files.len(),
            self.root.display()
        );

        self.metadata = Some(metadata);
        self.files = files;
        Ok(())
    }

    fn read_directory_metadata(&self) -> Result<PackMetadata> {
        let meta_path = self.root.join(PackConfig::METADATA_FILENAME);
        match std::fs::read(&meta_path) {
            Ok(bytes) => PackMetadata::from_slice(&bytes, &self.root),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if self.source == PackSource::Builtin {
                    PackMetadata::synthesized_builtin(&self.folder_name())
                } else {
                    Err(PetpackError::load(
                        &self.root,
                        format!("Missing {}", PackConfig::METADATA_FILENAME),
                        Some(Box::new(e)),
                    ))
                }
            }
            Err(e) => Err(PetpackError::load(
                &self.root,
                format!("Failed to read {}: {}", PackConfig::METADATA_FILENAME, e),
                Some(Box::new(e)),
            )),
        }
    }

    fn folder_name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn is_loaded(&self) -> bool {
        self.metadata.is_some()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source(&self) -> PackSource {
        self.source
    }

    pub fn metadata(&self) -> Option<&PackMetadata> {
        self.metadata.as_ref()
    }

    pub fn id(&self) -> Option<&str> {
        self.metadata.as_ref().map(|m| m.id.as_str())
    }

    pub fn has_file(&self, rel_path: &str) -> bool {
        self.files.contains_key(normalize_path(rel_path).as_str())
    }

    pub fn content_locator(&self, rel_path: &str) -> Option<&ContentLocator> {
        self.files.get(normalize_path(rel_path).as_str())
    }

    /// Read one file's bytes. Unknown paths are a read error.
    pub fn read_content(&self, rel_path: &str) -> Result<Vec<u8>> {
        self.content_locator(rel_path)
            .ok_or_else(|| {
                PetpackError::read(
                    rel_path,
                    format!("Not present in pack at {}", self.root.display()),
                    None,
                )
            })?
            .read()
    }

    /// Relative paths and locators, sorted by path.
    pub fn files(&self) -> impl Iterator<Item = (&str, &ContentLocator)> {
        self.files.iter().map(|(path, loc)| (path.as_str(), loc))
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

fn scan_directory(root: &Path) -> Result<BTreeMap<String, ContentLocator>> {
    let mut files = BTreeMap::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !PackConfig::is_excluded_name(&e.file_name().to_string_lossy()));

    for entry in walker {
        let entry = entry.map_err(|e| {
            let message = format!("Failed to scan pack contents: {}", e);
            PetpackError::load(root, message, Some(Box::new(e)))
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let rel = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if rel == PackConfig::METADATA_FILENAME {
            continue;
        }

        files.insert(rel, ContentLocator::file(entry.path()));
    }

    Ok(files)
}

fn load_archive(path: &Path) -> Result<(PackMetadata, BTreeMap<String, ContentLocator>)> {
    let file = File::open(path).map_err(|e| {
        PetpackError::load(path, format!("Failed to open archive: {}", e), Some(Box::new(e)))
    })?;

    let mut archive = zip::ZipArchive::new(file).map_err(|e| {
        PetpackError::load(path, format!("Failed to read zip: {}", e), Some(Box::new(e)))
    })?;

    let metadata = {
        let mut meta_file = archive
            .by_name(PackConfig::METADATA_FILENAME)
            .map_err(|e| {
                PetpackError::load(
                    path,
                    format!("Missing {}: {}", PackConfig::METADATA_FILENAME, e),
                    Some(Box::new(e)),
                )
            })?;
        let mut bytes = Vec::new();
        meta_file.read_to_end(&mut bytes).map_err(|e| {
            PetpackError::load(
                path,
                format!("Failed to read {}: {}", PackConfig::METADATA_FILENAME, e),
                Some(Box::new(e)),
            )
        })?;
        PackMetadata::from_slice(&bytes, path)?
    };

    let mut files = BTreeMap::new();
    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i).map_err(|e| {
            PetpackError::load(path, format!("Failed to read zip entry: {}", e), Some(Box::new(e)))
        })?;

        if entry.is_dir() {
            continue;
        }

        let entry_name = entry.name().to_string();
        let rel = normalize_path(&entry_name);
        if rel.is_empty()
            || rel == PackConfig::METADATA_FILENAME
            || rel.split('/').any(PackConfig::is_excluded_name)
        {
            continue;
        }

        files.insert(rel, ContentLocator::archive_entry(path, entry_name));
    }

    Ok((metadata, files))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_file(path: &Path, data: &[u8]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, data) in entries {
            if name.ends_with('/') {
                writer
                    .add_directory(name.trim_end_matches('/'), SimpleFileOptions::default())
                    .unwrap();
            } else {
                writer
                    .start_file(*name, SimpleFileOptions::default())
                    .unwrap();
                writer.write_all(data).unwrap();
            }
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_directory_pack_scan() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("cat");
        write_file(&root.join("pack.json"), br#"{"id": "cat", "name": "Cat"}"#);
        write_file(&root.join("icons/a.png"), b"A");
        write_file(&root.join("anim/idle/0.png"), b"I0");
        write_file(&root.join(".git/config"), b"x");
        write_file(&root.join("__pycache__/x.pyc"), b"x");
        write_file(&root.join(".hidden"), b"x");

        let mut pack = ResourcePack::directory(&root);
        assert!(!pack.is_loaded());
        pack.load().unwrap();

        assert_eq!(pack.id(), Some("cat"));
        let paths: Vec<_> = pack.files().map(|(p, _)| p.to_string()).collect();
        assert_eq!(paths, vec!["anim/idle/0.png", "icons/a.png"]);
        assert!(!pack.has_file("pack.json"));
        assert!(pack.has_file("./icons/a.png"));
        assert_eq!(pack.read_content("icons/a.png").unwrap(), b"A");
    }

    #[test]
    fn test_directory_pack_without_metadata_fails() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("nometa");
        write_file(&root.join("icons/a.png"), b"A");

        let err = ResourcePack::directory(&root).load().unwrap_err();
        assert!(matches!(err, PetpackError::Load { .. }));
    }

    #[test]
    fn test_builtin_synthesizes_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("default");
        write_file(&root.join("idle.png"), b"I");

        let mut pack = ResourcePack::builtin(&root);
        pack.load().unwrap();
        assert_eq!(pack.id(), Some("builtin.default"));
        assert_eq!(pack.file_count(), 1);
    }

    #[test]
    fn test_load_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("cat");
        write_file(&root.join("pack.json"), br#"{"id": "cat", "name": "Cat"}"#);
        write_file(&root.join("a.png"), b"A");

        let mut pack = ResourcePack::directory(&root);
        pack.load().unwrap();
        // New files after load are not picked up; the pack is frozen.
        write_file(&root.join("b.png"), b"B");
        pack.load().unwrap();
        assert_eq!(pack.file_count(), 1);
    }

    #[test]
    fn test_archive_pack_scan() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("winter.zip");
        write_zip(
            &archive,
            &[
                ("pack.json", br#"{"id": "winter", "name": "Winter", "version": "1.2"}"#),
                ("icons/", b""),
                ("icons/a.png", b"W"),
                ("__MACOSX/icons/._a.png", b"junk"),
                (".git/HEAD", b"junk"),
            ],
        );

        let mut pack = ResourcePack::archive(&archive);
        pack.load().unwrap();

        assert_eq!(pack.id(), Some("winter"));
        assert_eq!(pack.file_count(), 1);
        assert_eq!(
            pack.content_locator("icons/a.png"),
            Some(&ContentLocator::archive_entry(&archive, "icons/a.png"))
        );
        assert_eq!(pack.read_content("icons/a.png").unwrap(), b"W");
    }

    #[test]
    fn test_corrupt_archive_is_load_error() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("broken.zip");
        write_file(&archive, b"this is not a zip file");

        let err = ResourcePack::archive(&archive).load().unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_archive_missing_metadata_is_load_error() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("nometa.zip");
        write_zip(&archive, &[("icons/a.png", b"A")]);

        let err = ResourcePack::archive(&archive).load().unwrap_err();
        assert!(matches!(err, PetpackError::Load { .. }));
    }

    #[test]
    fn test_read_unknown_path() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("cat");
        write_file(&root.join("pack.json"), br#"{"id": "cat", "name": "Cat"}"#);

        let mut pack = ResourcePack::directory(&root);
        pack.load().unwrap();
        assert!(matches!(
            pack.read_content("nope.png"),
            Err(PetpackError::Read { .. })
        ));
    }

    #[test]
    fn test_detect() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("dirpack");
        std::fs::create_dir_all(&dir).unwrap();
        let zip_path = temp_dir.path().join("zipped.ZIP");
        write_file(&zip_path, b"");
        let txt = temp_dir.path().join("notes.txt");
        write_file(&txt, b"");

        assert_eq!(
            ResourcePack::detect(&dir).map(|p| p.source()),
            Some(PackSource::Directory)
        );
        assert_eq!(
            ResourcePack::detect(&zip_path).map(|p| p.source()),
            Some(PackSource::Archive)
        );
        assert!(ResourcePack::detect(&txt).is_none());
    }
}
