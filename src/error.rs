//! Error handling for SerialScope
//!
//! This module defines the crate error type and a Result alias for use
//! throughout the library. User-supplied code (pipeline stages, source
//! callbacks) reports failures through `anyhow` instead.

use thiserror::Error;

/// Main error type for SerialScope operations
#[derive(Error, Debug)]
pub enum ScopeError {
    /// No serial port could be found during auto-detection
    #[error("No serial device found")]
    NoDevice,

    /// The driver refused to open a port
    #[error("Failed to open {port}: {message}")]
    Open { port: String, message: String },

    /// Driver-level read or write failure on an open link
    #[error("Serial link error: {0}")]
    Link(String),

    /// Operation requires an open connection
    #[error("Serial port not connected")]
    NotConnected,

    /// `record()` called before `start()`
    #[error("Recorder not started, call start() first")]
    RecorderNotStarted,

    /// `events()` called on a replayer that is not open
    #[error("Replayer not open, call open() first")]
    ReplayerNotOpen,

    /// A session record could not be turned into an event
    #[error("Invalid session record: {0}")]
    Record(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to session files
    #[error("Session error: {0}")]
    Session(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid search pattern
    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ScopeError>,
    },
}

impl ScopeError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ScopeError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error means the link itself is gone and must be reopened.
    ///
    /// Anything else seen by the reader loop is treated as transient.
    pub fn is_link_failure(&self) -> bool {
        match self {
            ScopeError::Link(_) | ScopeError::NotConnected => true,
            ScopeError::WithContext { source, .. } => source.is_link_failure(),
            _ => false,
        }
    }
}

/// Result type alias for SerialScope operations
pub type Result<T> = std::result::Result<T, ScopeError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<ScopeError>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| ScopeError::with_context(e.into(), context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| ScopeError::with_context(e.into(), f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ScopeError::Open {
            port: "/dev/ttyUSB0".to_string(),
            message: "Permission denied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to open /dev/ttyUSB0: Permission denied"
        );
    }

    #[test]
    fn test_error_with_context() {
        let err = ScopeError::NoDevice;
        let with_ctx = err.with_context("Failed to connect to serial port");
        assert!(with_ctx.to_string().contains("Failed to connect"));
        assert!(with_ctx.to_string().contains("No serial device found"));
    }

    #[test]
    fn test_link_failure_classification() {
        assert!(ScopeError::Link("device unplugged".into()).is_link_failure());
        assert!(ScopeError::Link("gone".into())
            .with_context("read")
            .is_link_failure());
        assert!(!ScopeError::Session("x".into()).is_link_failure());

        let timeout = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        assert!(!ScopeError::from(timeout).is_link_failure());
    }

    #[test]
    fn test_result_ext_context() {
        let result: Result<()> = Err(ScopeError::NotConnected);
        let err = result.context("write").unwrap_err();
        assert_eq!(err.to_string(), "write: Serial port not connected");
    }
}
