//! Configuration parsing and structures

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::env::{default_config_path, expand_vars};

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// External tool configuration
    #[serde(default)]
    pub gio: GioConfig,

    /// Device discovery configuration
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Settings for the `gio` executable
#[derive(Debug, Clone, Deserialize)]
pub struct GioConfig {
    /// Program name or path
    #[serde(default = "default_program")]
    pub program: String,
}

fn default_program() -> String {
    "gio".to_string()
}

impl Default for GioConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
        }
    }
}

/// Settings for photo device discovery
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    /// Mount table scanned for the GVFS fuse mount point
    #[serde(default = "default_mount_table")]
    pub mount_table: PathBuf,

    /// Mount source identifying the GVFS fuse daemon
    #[serde(default = "default_fuse_daemon")]
    pub fuse_daemon: String,

    /// Directory holding the pictures on a device
    #[serde(default = "default_photo_dir")]
    pub photo_dir: String,

    /// Mount protocols considered as photo devices. Empty means every
    /// protocol.
    #[serde(default)]
    pub protocols: Vec<String>,
}

fn default_mount_table() -> PathBuf {
    PathBuf::from("/proc/self/mounts")
}

fn default_fuse_daemon() -> String {
    "gvfsd-fuse".to_string()
}

fn default_photo_dir() -> String {
    "DCIM".to_string()
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            mount_table: default_mount_table(),
            fuse_daemon: default_fuse_daemon(),
            photo_dir: default_photo_dir(),
            protocols: Vec::new(),
        }
    }
}

impl DiscoveryConfig {
    /// Whether mounts of `protocol` are searched for photos
    pub fn accepts(&self, protocol: &str) -> bool {
        self.protocols.is_empty() || self.protocols.iter().any(|p| p == protocol)
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let raw: Config =
            serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        raw.resolve()
    }

    /// Load `path` if given, otherwise the default file when it exists,
    /// otherwise built-in defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match default_config_path() {
            Some(default) if default.is_file() => Self::from_file(&default),
            _ => Ok(Self::default()),
        }
    }

    /// Expand environment references in path-like values
    fn resolve(mut self) -> Result<Self, ConfigError> {
        self.gio.program = expand_vars(&self.gio.program)?;
        let table = expand_vars(&self.discovery.mount_table.to_string_lossy())?;
        self.discovery.mount_table = PathBuf::from(table);
        Ok(self)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gio.program.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "gio.program cannot be empty".to_string(),
            ));
        }

        if self.discovery.protocols.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "discovery.protocols cannot contain an empty name".to_string(),
            ));
        }

        let photo_dir = self.discovery.photo_dir.trim();
        if photo_dir.is_empty() || photo_dir.contains('/') {
            return Err(ConfigError::ValidationError(format!(
                "discovery.photo_dir must be a single directory name, got {:?}",
                self.discovery.photo_dir
            )));
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(PathBuf, String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}
