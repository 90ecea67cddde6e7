//! Configuration management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Where the history and settings live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the state document (default: <data dir>/clip-recall/state.json)
    #[serde(default = "default_state_file")]
    pub state_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
        }
    }
}

fn default_state_file() -> String {
    Config::data_dir()
        .join("state.json")
        .to_string_lossy()
        .to_string()
}

/// Export configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Base directory that relative export folders are resolved against
    #[serde(default = "default_export_root")]
    pub root: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            root: default_export_root(),
        }
    }
}

fn default_export_root() -> String {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .map(|d| d.to_string_lossy().to_string())
        .unwrap_or_else(|| ".".to_string())
}

/// Display configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Date format string for listings
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            date_format: default_date_format(),
        }
    }
}

fn default_date_format() -> String {
    "%m/%d %H:%M".to_string()
}

impl Config {
    /// Load configuration from default location.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();

        if config_path.exists() {
            Self::from_file(&config_path.to_string_lossy())
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: &str) -> Result<Self> {
        let expanded = expand_path(path);
        let content = std::fs::read_to_string(&expanded)
            .with_context(|| format!("Failed to read config file {}", expanded))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", expanded))?;
        Ok(config)
    }

    /// Get the default config path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("clip-recall")
            .join("config.toml")
    }

    /// Get the data directory for the state file.
    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("clip-recall")
    }

    /// Get the state document path.
    pub fn state_file(&self) -> PathBuf {
        PathBuf::from(expand_path(&self.storage.state_file))
    }

    /// Resolve an export folder setting to a directory.
    ///
    /// Absolute and `~/` paths are used as they are; anything else is
    /// relative to the export root.
    pub fn resolve_export_folder(&self, folder: &str) -> PathBuf {
        let expanded = PathBuf::from(expand_path(folder));
        if expanded.is_absolute() {
            expanded
        } else {
            Path::new(&expand_path(&self.export.root)).join(expanded)
        }
    }
}

/// Expand ~ to home directory.
fn expand_path(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).to_string_lossy().to_string();
        }
    }
    path.to_string()
}
