//! Configuration module for SerialScope
//!
//! Settings are read from a TOML file with one table per component:
//!
//! ```toml
//! [source]
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//!
//! [framer]
//! mode = "json"
//!
//! [session]
//! record = true
//!
//! [filter]
//! levels = ["WARN", "ERROR"]
//! ```
//!
//! # Config Location
//!
//! Without an explicit path the file is looked up in the platform config
//! directory:
//! - **Linux**: `~/.config/serialscope/config.toml`
//! - **macOS**: `~/Library/Application Support/serialscope/config.toml`
//! - **Windows**: `%APPDATA%\serialscope\config.toml`

pub mod settings;

pub use settings::*;

use crate::error::{Result, ScopeError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application directory name inside the platform config directory
pub const APP_DIR: &str = "serialscope";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Get the platform config directory for SerialScope
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_DIR))
}

/// Get the default config file path
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join(CONFIG_FILE))
}

/// Complete SerialScope configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Serial connection
    pub source: SourceConfig,

    /// Stream framing
    pub framer: FramerConfig,

    /// Recording and replay
    pub session: SessionConfig,

    /// Event filtering
    pub filter: FilterConfig,
}

impl ScopeConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ScopeError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Serialize configuration to TOML text
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ScopeError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Load configuration from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ScopeError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Load the default config file, falling back to defaults
    ///
    /// A missing file is silent; an unreadable or invalid one is logged.
    pub fn load_or_default() -> Self {
        let Some(path) = default_config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }

        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save configuration to a file, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                ScopeError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content)
            .map_err(|e| ScopeError::Config(format!("Failed to write config: {}", e)))
    }
}
