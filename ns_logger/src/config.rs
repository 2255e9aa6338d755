//! Logger configuration loaded from TOML

use crate::args::DEFAULT_PREVIEW_LEN;
use crate::error::LoggerError;
use crate::store::MemoryStore;
use crate::types::{LevelSet, CONSOLE_NAMESPACE};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Levels forwarded to the original console functions
    pub console_enabled: LevelSet,

    /// Levels persisted to the datastore
    pub db_enabled: LevelSet,

    /// Characters of markup text shown on the console
    pub preview_len: usize,

    /// Store capacity; unbounded when absent
    pub max_records: Option<usize>,

    /// Namespace given to intercepted console and tracing output
    pub capture_namespace: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            console_enabled: LevelSet::all(),
            db_enabled: LevelSet::all(),
            preview_len: DEFAULT_PREVIEW_LEN,
            max_records: None,
            capture_namespace: CONSOLE_NAMESPACE.to_string(),
        }
    }
}

impl LoggerConfig {
    /// Parse configuration from TOML text; missing keys take defaults
    pub fn from_toml_str(content: &str) -> Result<Self, LoggerError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LoggerError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// A memory store honoring `max_records`
    pub fn build_store(&self) -> MemoryStore {
        MemoryStore::with_capacity(self.max_records)
    }
}
