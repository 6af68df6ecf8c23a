//! Persisted active pack ordering.

use crate::error::Result;
use crate::persist::{atomic_read_json, atomic_write_json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// On-disk form of the active ordering (index 0 = highest priority).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivePacksState {
    #[serde(default)]
    pub active: Vec<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ActivePacksState {
    pub fn new(active: Vec<String>) -> Self {
        Self {
            active,
            updated_at: Some(Utc::now()),
        }
    }

    pub fn load(path: &Path) -> Result<Option<Self>> {
        atomic_read_json(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        atomic_write_json(path, self)
    }
}
