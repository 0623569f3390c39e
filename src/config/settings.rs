//! Per-component settings
//!
//! Each section of the config file maps to one struct here. All fields have
//! defaults so a partial file (or none at all) is valid.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::framer::FramerMode;

/// Default serial baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default read/write timeout in milliseconds
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 1000;

/// Default delay between reconnect attempts in milliseconds
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 2000;

/// Default idle wait of the reader loop in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5;

/// Default directory for recorded sessions
pub const DEFAULT_SESSIONS_DIR: &str = "sessions";

// ==================== Source ====================

/// Serial connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Port name; `None` or `"auto"` selects a port automatically
    pub port: Option<String>,

    /// Baud rate
    pub baud_rate: u32,

    /// Read/write timeout, also the default wait for `read()`
    pub read_timeout_ms: u64,

    /// Reopen the port after it is lost
    pub auto_reconnect: bool,

    /// Wait between reconnect attempts
    pub reconnect_interval_ms: u64,

    /// Reader loop sleep when no bytes are pending
    pub poll_interval_ms: u64,

    /// Queue bound; `None` keeps every chunk
    pub queue_capacity: Option<usize>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            auto_reconnect: true,
            reconnect_interval_ms: DEFAULT_RECONNECT_INTERVAL_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            queue_capacity: None,
        }
    }
}

impl SourceConfig {
    /// Settings for a specific port
    pub fn for_port(port: impl Into<String>) -> Self {
        Self {
            port: Some(port.into()),
            ..Self::default()
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// ==================== Framer ====================

/// Framing settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramerConfig {
    /// Stream format, `auto` to detect
    pub mode: FramerMode,
}

// ==================== Session ====================

/// Recording and replay settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Record live sessions
    pub record: bool,

    /// Explicit output file; generated inside `sessions_dir` when unset
    pub record_path: Option<PathBuf>,

    /// Directory for generated session files
    pub sessions_dir: PathBuf,

    /// Replay speed multiplier; zero or negative replays without delays
    pub replay_speed: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            record: false,
            record_path: None,
            sessions_dir: PathBuf::from(DEFAULT_SESSIONS_DIR),
            replay_speed: 1.0,
        }
    }
}

// ==================== Filters ====================

/// Event filtering settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Level names to show; empty shows everything
    pub levels: Vec<String>,

    /// Regular expression matched against raw text or message
    pub search: Option<String>,

    /// Registered stage names applied after the filters
    pub stages: Vec<String>,
}

impl FilterConfig {
    /// Whether any filtering is configured
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty() && self.search.is_none() && self.stages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_defaults() {
        let config = SourceConfig::default();
        assert_eq!(config.port, None);
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.read_timeout(), Duration::from_secs(1));
        assert_eq!(config.reconnect_interval(), Duration::from_secs(2));
        assert!(config.auto_reconnect);
        assert!(config.queue_capacity.is_none());
    }

    #[test]
    fn test_for_port() {
        let config = SourceConfig::for_port("/dev/ttyUSB0");
        assert_eq!(config.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
    }

    #[test]
    fn test_partial_source_section() {
        let config: SourceConfig = toml::from_str("baud_rate = 9600").unwrap();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.read_timeout_ms, DEFAULT_READ_TIMEOUT_MS);
    }

    #[test]
    fn test_session_defaults() {
        let config = SessionConfig::default();
        assert!(!config.record);
        assert_eq!(config.sessions_dir, PathBuf::from("sessions"));
        assert_eq!(config.replay_speed, 1.0);
    }

    #[test]
    fn test_filter_is_empty() {
        let mut filter = FilterConfig::default();
        assert!(filter.is_empty());
        filter.levels.push("ERROR".to_string());
        assert!(!filter.is_empty());
    }
}
