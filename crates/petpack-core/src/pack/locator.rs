//! Content locators: where a pack file's bytes actually live.

use crate::error::{PetpackError, Result};
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Pointer to the bytes of one pack file.
///
/// Archive locators carry no open handle; each read re-opens the archive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentLocator {
    /// A plain file on disk.
    File { path: PathBuf },
    /// An entry inside a zip archive.
    Archive { archive: PathBuf, entry: String },
}

impl ContentLocator {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        ContentLocator::File { path: path.into() }
    }

    pub fn archive_entry(archive: impl Into<PathBuf>, entry: impl Into<String>) -> Self {
        ContentLocator::Archive {
            archive: archive.into(),
            entry: entry.into(),
        }
    }

    /// The filesystem path backing this locator (the archive for entries).
    pub fn backing_path(&self) -> &Path {
        match self {
            ContentLocator::File { path } => path,
            ContentLocator::Archive { archive, .. } => archive,
        }
    }

    /// Read the full contents.
    pub fn read(&self) -> Result<Vec<u8>> {
        match self {
            ContentLocator::File { path } => std::fs::read(path).map_err(|e| {
                PetpackError::read(
                    path.display().to_string(),
                    format!("Failed to read file: {}", e),
                    Some(Box::new(e)),
                )
            }),
            ContentLocator::Archive { archive, entry } => read_archive_entry(archive, entry),
        }
    }
}

impl fmt::Display for ContentLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentLocator::File { path } => write!(f, "{}", path.display()),
            ContentLocator::Archive { archive, entry } => {
                write!(f, "{}!/{}", archive.display(), entry)
            }
        }
    }
}

fn read_archive_entry(archive_path: &Path, entry: &str) -> Result<Vec<u8>> {
    let location = format!("{}!/{}", archive_path.display(), entry);

    let file = File::open(archive_path).map_err(|e| {
        PetpackError::read(
            location.clone(),
            format!("Failed to open archive: {}", e),
            Some(Box::new(e)),
        )
    })?;

    let mut archive = zip::ZipArchive::new(file).map_err(|e| {
        PetpackError::read(
            location.clone(),
            format!("Failed to read zip: {}", e),
            Some(Box::new(e)),
        )
    })?;

    let mut zip_file = archive.by_name(entry).map_err(|e| {
        PetpackError::read(
            location.clone(),
            format!("Archive entry unavailable: {}", e),
            Some(Box::new(e)),
        )
    })?;

    let mut contents = Vec::with_capacity(capacity_hint(zip_file.size()));
    zip_file.read_to_end(&mut contents).map_err(|e| {
        PetpackError::read(
            location,
            format!("Failed to read from archive: {}", e),
            Some(Box::new(e)),
        )
    })?;

    Ok(contents)
}

/// Upper bound on the buffer reserved up front from an entry's declared size.
const MAX_PREALLOC: u64 = 1 << 20;

/// Preallocation for an archive entry. The declared size is untrusted.
fn capacity_hint(declared: u64) -> usize {
    declared.min(MAX_PREALLOC) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, data) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_read_file_locator() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("idle.png");
        std::fs::write(&path, b"PNGDATA").unwrap();

        let locator = ContentLocator::file(&path);
        assert_eq!(locator.read().unwrap(), b"PNGDATA");
        assert_eq!(locator.backing_path(), path.as_path());
    }

    #[test]
    fn test_read_archive_entry() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("pack.zip");
        write_zip(&archive, &[("icons/a.png", b"A"), ("sounds/meow.ogg", b"M")]);

        let locator = ContentLocator::archive_entry(&archive, "sounds/meow.ogg");
        assert_eq!(locator.read().unwrap(), b"M");
        assert_eq!(
            locator.to_string(),
            format!("{}!/sounds/meow.ogg", archive.display())
        );
    }

    #[test]
    fn test_missing_archive_entry_is_read_error() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("pack.zip");
        write_zip(&archive, &[("icons/a.png", b"A")]);

        let err = ContentLocator::archive_entry(&archive, "icons/missing.png")
            .read()
            .unwrap_err();
        assert!(matches!(err, PetpackError::Read { .. }));
    }

    #[test]
    fn test_capacity_hint_is_capped() {
        assert_eq!(capacity_hint(0), 0);
        assert_eq!(capacity_hint(4096), 4096);
        assert_eq!(capacity_hint(u64::MAX), MAX_PREALLOC as usize);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = ContentLocator::file("/definitely/not/here.png")
            .read()
            .unwrap_err();
        assert_eq!(err.kind(), "read");
    }
}
