//! Pack metadata (`pack.json`) parsing and validation.

use crate::config::PackConfig;
use crate::error::{PetpackError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;

/// Declared metadata format of a pack.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PackFormat {
    /// Flat file set.
    #[default]
    Base = 1,
    /// Nested folders and richer metadata.
    Nested = 2,
    /// Dependencies and conditional loading (declared only).
    Conditional = 3,
}

impl PackFormat {
    pub fn from_number(n: u64) -> Option<Self> {
        match n {
            1 => Some(PackFormat::Base),
            2 => Some(PackFormat::Nested),
            3 => Some(PackFormat::Conditional),
            _ => None,
        }
    }

    pub fn as_number(self) -> u8 {
        self as u8
    }
}

/// A pack version of one to three dot-separated integers.
///
/// Ordering is numeric per component with missing components read as zero,
/// so `1.10 > 1.9` and `1.2 == 1.2.0`.
#[derive(Debug, Clone)]
pub struct PackVersion {
    raw: String,
    parts: [u64; 3],
}

impl PackVersion {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let mut parts = [0u64; 3];
        let mut count = 0;

        for piece in trimmed.split('.') {
            if count == parts.len() {
                return Err(PetpackError::validation(
                    "version",
                    format!("'{}' has more than three components", raw),
                ));
            }
            if piece.is_empty() || !piece.bytes().all(|b| b.is_ascii_digit()) {
                return Err(PetpackError::validation(
                    "version",
                    format!("'{}' is not a dotted integer version", raw),
                ));
            }
            parts[count] = piece.parse().map_err(|_| {
                PetpackError::validation("version", format!("'{}' component out of range", raw))
            })?;
            count += 1;
        }

        Ok(Self {
            raw: trimmed.to_string(),
            parts,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl PartialEq for PackVersion {
    fn eq(&self, other: &Self) -> bool {
        self.parts == other.parts
    }
}

impl Eq for PackVersion {}

impl PartialOrd for PackVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parts.cmp(&other.parts)
    }
}

impl fmt::Display for PackVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for PackVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

/// `pack.json` as written on disk; every field optional so validation can
/// report which one is wrong.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPackMetadata {
    id: Option<String>,
    name: Option<String>,
    version: Option<String>,
    description: Option<String>,
    format: Option<u64>,
    author: Option<String>,
    dependencies: Vec<String>,
    tags: Vec<String>,
}

/// Validated identity of a pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackMetadata {
    pub id: String,
    pub name: String,
    pub version: PackVersion,
    pub format: PackFormat,
    pub author: Option<String>,
    pub description: Option<String>,
    pub dependencies: Vec<String>,
    pub tags: Vec<String>,
}

impl PackMetadata {
    /// Parse and validate metadata bytes read from `origin`.
    ///
    /// Malformed JSON is a load error; well-formed JSON with bad fields is a
    /// validation error.
    pub fn from_slice(bytes: &[u8], origin: &Path) -> Result<Self> {
        let raw: RawPackMetadata = serde_json::from_slice(bytes).map_err(|e| {
            PetpackError::load(
                origin,
                format!("Malformed {}: {}", PackConfig::METADATA_FILENAME, e),
                Some(Box::new(e)),
            )
        })?;
        Self::validate(raw)
    }

    /// Metadata for a built-in folder that ships without `pack.json`.
    pub fn synthesized_builtin(folder_name: &str) -> Result<Self> {
        let id = format!("{}{}", PackConfig::BUILTIN_ID_PREFIX, folder_name);
        validate_id(&id)?;
        Ok(Self {
            id,
            name: folder_name.to_string(),
            version: PackVersion::parse(PackConfig::DEFAULT_VERSION)?,
            format: PackFormat::Base,
            author: None,
            description: None,
            dependencies: Vec::new(),
            tags: Vec::new(),
        })
    }

    fn validate(raw: RawPackMetadata) -> Result<Self> {
        let id = raw
            .id
            .ok_or_else(|| PetpackError::validation("id", "missing required field"))?;
        validate_id(&id)?;

        let name = raw
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| PetpackError::validation("name", "missing required field"))?;

        let version = PackVersion::parse(
            raw.version
                .as_deref()
                .unwrap_or(PackConfig::DEFAULT_VERSION),
        )?;

        let format = match raw.format {
            None => PackFormat::default(),
            Some(n) => PackFormat::from_number(n).ok_or_else(|| {
                PetpackError::validation("format", format!("unknown format version {}", n))
            })?,
        };

        Ok(Self {
            id,
            name,
            version,
            format,
            author: raw.author,
            description: raw.description,
            dependencies: raw.dependencies,
            tags: raw.tags,
        })
    }
}

/// Check that an id is non-empty ASCII alphanumerics plus `. _ -`.
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(PetpackError::validation("id", "must not be empty"));
    }
    if let Some(bad) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(PetpackError::validation(
            "id",
            format!("'{}' contains invalid character {:?}", id, bad),
        ));
    }
    Ok(())
}
