//! # PlateStack Loader Configuration
//!
//! [`LoaderConfig`] tunes how containers are scanned and which platform
//! versions relations are checked against. It can be read from JSON, YAML
//! (`yaml-config` feature) or TOML (`toml-config` feature) files; the same
//! [`ConfigFormat`] also decodes class-header entries found in containers.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::kernel::constants::{DEFAULT_CLASS_SUFFIXES, DEFAULT_MAX_ENTRIES, DEFAULT_MAX_ENTRY_BYTES};
use crate::plugin_system::namespace::PlatformNamespace;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported configuration format for '{0}'")]
    UnsupportedFormat(PathBuf),

    #[error("Failed to deserialize from {format}: {message}")]
    Parse { format: &'static str, message: String },

    #[error("Failed to serialize to {format}: {message}")]
    Serialize { format: &'static str, message: String },
}

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }

    pub fn deserialize<T: DeserializeOwned>(&self, data: &str) -> Result<T, ConfigError> {
        let parse_error = |message: String| ConfigError::Parse { format: self.extension(), message };
        match self {
            ConfigFormat::Json => serde_json::from_str(data).map_err(|e| parse_error(e.to_string())),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(data).map_err(|e| parse_error(e.to_string())),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data).map_err(|e| parse_error(e.to_string())),
        }
    }

    pub fn serialize<T: Serialize>(&self, value: &T) -> Result<String, ConfigError> {
        let serialize_error = |message: String| ConfigError::Serialize { format: self.extension(), message };
        match self {
            ConfigFormat::Json => serde_json::to_string_pretty(value).map_err(|e| serialize_error(e.to_string())),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::to_string(value).map_err(|e| serialize_error(e.to_string())),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::to_string_pretty(value).map_err(|e| serialize_error(e.to_string())),
        }
    }
}

/// What the loader does when a container cannot be scanned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanErrorPolicy {
    /// Fail the whole load
    #[default]
    Abort,
    /// Log the failure and continue with the other containers
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Entry name suffixes holding class headers
    pub class_suffixes: Vec<String>,

    /// Maximum number of class entries per container
    pub max_entries: usize,

    /// Maximum size of a single entry, in bytes
    pub max_entry_bytes: u64,

    pub scan_error_policy: ScanErrorPolicy,

    /// Version of the host runtime, compared against the `runtime`
    /// requirement of each plugin
    pub runtime_version: Option<String>,

    /// Platform entries relations in the `platform` namespace are checked
    /// against, id to version
    pub platform: BTreeMap<String, String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            class_suffixes: DEFAULT_CLASS_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            max_entries: DEFAULT_MAX_ENTRIES,
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
            scan_error_policy: ScanErrorPolicy::default(),
            runtime_version: None,
            platform: BTreeMap::new(),
        }
    }
}

impl LoaderConfig {
    /// Reads a configuration file, picking the format from its extension.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        let config = format.deserialize(&data)?;
        log::debug!("Loaded loader configuration from {}", path.display());
        Ok(config)
    }

    pub fn parse(data: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        format.deserialize(data)
    }

    pub fn render(&self, format: ConfigFormat) -> Result<String, ConfigError> {
        format.serialize(self)
    }

    pub fn platform_namespace(&self) -> PlatformNamespace {
        self.platform.iter().map(|(id, version)| (id.as_str(), version.as_str())).collect()
    }
}
