//! Lens Configuration
//!
//! Settings shared by the explorer, the persistence layer, and the CLI.
//! Loaded from a JSON file; every key is optional.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::{log_event_with_fields, Event, Severity};

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "TYPELENS_CONFIG_READ_ERROR",
            ConfigError::Parse { .. } => "TYPELENS_CONFIG_PARSE_ERROR",
        }
    }
}

/// Lens configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LensConfig {
    /// File stem of the persisted-field store (default: "type-explorer")
    #[serde(default = "default_store_namespace")]
    pub store_namespace: String,

    /// Show base-type fields by default for types with no fields of their own (default: true)
    #[serde(default = "default_auto_include_base_types")]
    pub auto_include_base_types: bool,

    /// Minimum log severity (default: info)
    #[serde(default = "default_log_level")]
    pub log_level: Severity,
}

fn default_store_namespace() -> String {
    "type-explorer".to_string()
}

fn default_auto_include_base_types() -> bool {
    true
}

fn default_log_level() -> Severity {
    Severity::Info
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            store_namespace: default_store_namespace(),
            auto_include_base_types: default_auto_include_base_types(),
            log_level: default_log_level(),
        }
    }
}

impl LensConfig {
    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        let config: LensConfig = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: display.clone(),
            source,
        })?;
        log_event_with_fields(Event::ConfigLoaded, &[("path", display.as_str())]);
        Ok(config)
    }
}
