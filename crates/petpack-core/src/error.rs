//! Error types for petpack.
//!
//! Pack-level faults (`Load`, `Validation`) are recoverable: the registry
//! skips the offending pack and keeps going. Resource reads and cache loads
//! propagate their errors to the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed error produced by a user-supplied cache loader.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for the petpack library.
#[derive(Debug, Error)]
pub enum PetpackError {
    // Pack metadata errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Failed to load pack at {path:?}: {message}")]
    Load {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    // Resource errors
    #[error("Failed to read {path}: {message}")]
    Read {
        path: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Pack not found: {id}")]
    PackNotFound { id: String },

    // Cache errors
    #[error("Loader failed for cache key {key}")]
    CacheLoad {
        key: String,
        #[source]
        source: BoxError,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for petpack operations.
pub type Result<T> = std::result::Result<T, PetpackError>;

impl From<std::io::Error> for PetpackError {
    fn from(err: std::io::Error) -> Self {
        PetpackError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for PetpackError {
    fn from(err: serde_json::Error) -> Self {
        PetpackError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl PetpackError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        PetpackError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a pack load error.
    pub fn load(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: Option<BoxError>,
    ) -> Self {
        PetpackError::Load {
            path: path.into(),
            message: message.into(),
            source,
        }
    }

    /// Create a resource read error.
    pub fn read(path: impl Into<String>, message: impl Into<String>, source: Option<BoxError>) -> Self {
        PetpackError::Read {
            path: path.into(),
            message: message.into(),
            source,
        }
    }

    /// Create a metadata validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        PetpackError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable label used in structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            PetpackError::Validation { .. } => "validation",
            PetpackError::Load { .. } => "load",
            PetpackError::Read { .. } => "read",
            PetpackError::PackNotFound { .. } => "pack_not_found",
            PetpackError::CacheLoad { .. } => "cache_load",
            PetpackError::Io { .. } => "io",
            PetpackError::Json { .. } => "json",
            PetpackError::Config { .. } => "config",
            PetpackError::Other(_) => "other",
        }
    }

    /// Whether the registry may skip the failing pack and continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PetpackError::Validation { .. } | PetpackError::Load { .. }
        )
    }
}
