//! Core data types for SerialScope
//!
//! This module contains the unified event record that every other component
//! exchanges: the framer produces events, pipeline stages inspect or replace
//! them, the recorder persists them and the replayer reads them back.
//!
//! # Main Types
//!
//! - [`EventKind`] - Log, Metric or Packet
//! - [`LogLevel`] - Standard log levels, parsed case-insensitively
//! - [`Event`] - A single timestamped record with an ordered data map
//! - [`EventRecord`] - The on-disk shape of an event (one JSON object per line)
//!
//! # Level inference
//!
//! A `Log` event constructed without an explicit level picks one up from a
//! `level` entry in its data map when that entry names a known level. Unknown
//! names are ignored.

use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ScopeError};

/// Ordered key/value payload of an event
pub type EventData = serde_json::Map<String, Value>;

/// Classification of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Text log line
    Log,
    /// Numeric telemetry
    Metric,
    /// Framed binary packet
    Packet,
}

impl EventKind {
    /// Wire name used in session files and in `type` fields
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Log => "log",
            EventKind::Metric => "metric",
            EventKind::Packet => "packet",
        }
    }

    /// Parse a wire name. Matching is exact.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "log" => Some(EventKind::Log),
            "metric" => Some(EventKind::Metric),
            "packet" => Some(EventKind::Packet),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standard log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Warning,
    Error,
    Critical,
    Fatal,
}

impl LogLevel {
    /// Every level, in declaration order
    pub const ALL: [LogLevel; 7] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Critical,
        LogLevel::Fatal,
    ];

    /// Canonical upper-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
            LogLevel::Fatal => "FATAL",
        }
    }

    /// Parse a level name, ignoring case
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(name.trim()))
    }

    /// ERROR, CRITICAL or FATAL
    pub fn is_error(&self) -> bool {
        matches!(self, LogLevel::Error | LogLevel::Critical | LogLevel::Fatal)
    }

    /// WARN or WARNING
    pub fn is_warning(&self) -> bool {
        matches!(self, LogLevel::Warn | LogLevel::Warning)
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self> {
        LogLevel::parse(s).ok_or_else(|| ScopeError::Config(format!("Unknown log level '{}'", s)))
    }
}

/// A single structured event
///
/// Fields are public for reading; treat an event as immutable once it has
/// been handed to the pipeline and build a new one to change it.
///
/// Only the constructors ([`Event::new`], [`Event::from_parts`] and friends)
/// derive `level` from `data["level"]`. [`Event::from_record`] restores the
/// stored fields as-is, so any event, struct literals included, survives a
/// record round-trip unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Event classification
    pub kind: EventKind,
    /// Capture time (recorded time when replayed)
    pub timestamp: DateTime<Utc>,
    /// Optional log level
    pub level: Option<LogLevel>,
    /// Ordered payload
    pub data: EventData,
    /// Original text or hex representation
    pub raw: Option<String>,
    /// Origin tag
    pub source: Option<String>,
}

impl Event {
    /// Create an event stamped with the current time
    pub fn new(kind: EventKind, data: EventData) -> Self {
        Self::from_parts(kind, Utc::now(), None, data, None, None)
    }

    /// Create an event from every field, applying level inference
    pub fn from_parts(
        kind: EventKind,
        timestamp: DateTime<Utc>,
        level: Option<LogLevel>,
        data: EventData,
        raw: Option<String>,
        source: Option<String>,
    ) -> Self {
        let level = level.or_else(|| match kind {
            EventKind::Log => data.get("level").and_then(Value::as_str).and_then(LogLevel::parse),
            _ => None,
        });

        Self {
            kind,
            timestamp,
            level,
            data,
            raw,
            source,
        }
    }

    /// Log event with a single `message` entry
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        let mut data = EventData::new();
        data.insert("message".to_string(), Value::String(message.into()));
        Self::new(EventKind::Log, data).with_level(level)
    }

    /// Set the level
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = Some(level);
        self
    }

    /// Set the timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set the raw representation
    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }

    /// Set the origin tag
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// The `message` entry, if it is a string
    pub fn message(&self) -> Option<&str> {
        self.data.get("message").and_then(Value::as_str)
    }

    /// Check if event represents an error
    pub fn is_error(&self) -> bool {
        self.level.is_some_and(|l| l.is_error())
    }

    /// Check if event represents a warning
    pub fn is_warning(&self) -> bool {
        self.level.is_some_and(|l| l.is_warning())
    }

    /// Convert to the persisted record shape
    pub fn to_record(&self) -> EventRecord {
        EventRecord {
            kind: self.kind,
            timestamp: format_timestamp(&self.timestamp),
            level: self.level.map(|l| l.as_str().to_string()),
            data: self.data.clone(),
            raw: self.raw.clone(),
            source: self.source.clone(),
        }
    }

    /// Rebuild an event from a persisted record, field for field
    pub fn from_record(record: EventRecord) -> Result<Self> {
        let timestamp = parse_timestamp(&record.timestamp)?;
        let level = match record.level.as_deref() {
            None | Some("") => None,
            Some(name) => Some(
                LogLevel::parse(name)
                    .ok_or_else(|| ScopeError::Record(format!("unknown level '{}'", name)))?,
            ),
        };

        Ok(Self {
            kind: record.kind,
            timestamp,
            level,
            data: record.data,
            raw: record.raw,
            source: record.source,
        })
    }

    /// Serialize as a single JSON line (without the trailing newline)
    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_record())?)
    }

    /// Parse a single JSON line
    pub fn from_json_line(line: &str) -> Result<Self> {
        let record: EventRecord = serde_json::from_str(line)?;
        Self::from_record(record)
    }
}

/// Persisted form of an [`Event`]
///
/// Field order matches the session file schema:
/// `{type, timestamp, level, data, raw, source}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub timestamp: String,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub data: EventData,
    #[serde(default)]
    pub raw: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// ISO-8601 with as many fractional digits as needed to be exact
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse an ISO-8601 timestamp
///
/// Offset-less timestamps are interpreted in local time.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Ok(ts.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(|e| ScopeError::Record(format!("invalid timestamp '{}': {}", text, e)))?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|ts| ts.with_timezone(&Utc))
        .ok_or_else(|| ScopeError::Record(format!("nonexistent local time '{}'", text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> EventData {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_event_creation() {
        let event = Event::log(LogLevel::Info, "Test message");
        assert_eq!(event.kind, EventKind::Log);
        assert_eq!(event.level, Some(LogLevel::Info));
        assert_eq!(event.message(), Some("Test message"));
        assert!(event.raw.is_none());
        assert!(event.source.is_none());
    }

    #[test]
    fn test_level_inference() {
        let event = Event::new(
            EventKind::Log,
            data(json!({"level": "error", "message": "Error occurred"})),
        );
        assert_eq!(event.level, Some(LogLevel::Error));

        let unknown = Event::new(EventKind::Log, data(json!({"level": "LOUD"})));
        assert_eq!(unknown.level, None);

        let not_string = Event::new(EventKind::Log, data(json!({"level": 3})));
        assert_eq!(not_string.level, None);

        // Only logs infer a level
        let metric = Event::new(EventKind::Metric, data(json!({"level": "ERROR", "t": 1})));
        assert_eq!(metric.level, None);
    }

    #[test]
    fn test_explicit_level_wins() {
        let event = Event::from_parts(
            EventKind::Log,
            Utc::now(),
            Some(LogLevel::Debug),
            data(json!({"level": "ERROR"})),
            None,
            None,
        );
        assert_eq!(event.level, Some(LogLevel::Debug));
    }

    #[test]
    fn test_is_error_and_warning() {
        for level in [LogLevel::Error, LogLevel::Critical, LogLevel::Fatal] {
            assert!(Event::log(level, "x").is_error());
            assert!(!Event::log(level, "x").is_warning());
        }
        for level in [LogLevel::Warn, LogLevel::Warning] {
            assert!(Event::log(level, "x").is_warning());
            assert!(!Event::log(level, "x").is_error());
        }
        assert!(!Event::log(LogLevel::Info, "x").is_error());
        assert!(!Event::new(EventKind::Packet, EventData::new()).is_warning());
    }

    #[test]
    fn test_level_parse() {
        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warning));
        assert_eq!(LogLevel::parse("Warn"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("trace"), None);
        assert!("nope".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_to_record_shape() {
        let event = Event::new(EventKind::Metric, data(json!({"temp": 42.3, "voltage": 3.28})));
        let line = event.to_json_line().unwrap();
        let value: Value = serde_json::from_str(&line).unwrap();

        assert_eq!(value["type"], "metric");
        assert_eq!(value["level"], Value::Null);
        assert_eq!(value["data"]["temp"], 42.3);
        assert_eq!(value["raw"], Value::Null);
        assert!(value["timestamp"].is_string());

        let keys: Vec<&str> = value.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, ["type", "timestamp", "level", "data", "raw", "source"]);
    }

    #[test]
    fn test_from_record_naive_timestamp() {
        let line = r#"{"type":"log","timestamp":"2026-02-12T10:30:00","level":"INFO","data":{"message":"Test"},"raw":null,"source":null}"#;
        let event = Event::from_json_line(line).unwrap();
        assert_eq!(event.kind, EventKind::Log);
        assert_eq!(event.level, Some(LogLevel::Info));
        assert_eq!(event.message(), Some("Test"));
    }

    #[test]
    fn test_record_round_trip() {
        let event = Event::new(EventKind::Packet, data(json!({"payload": "0a0b", "length": 2})))
            .with_raw("0a0b")
            .with_source("uart1");

        let back = Event::from_json_line(&event.to_json_line().unwrap()).unwrap();
        assert_eq!(back, event);

        let bare = Event::new(EventKind::Metric, data(json!({"x": 1})));
        let back = Event::from_record(bare.to_record()).unwrap();
        assert_eq!(back, bare);
        assert!(back.raw.is_none() && back.source.is_none() && back.level.is_none());
    }

    #[test]
    fn test_struct_literal_round_trips_without_inference() {
        let event = Event {
            kind: EventKind::Log,
            timestamp: Utc::now(),
            level: None,
            data: data(json!({"level": "ERROR", "message": "boom"})),
            raw: None,
            source: None,
        };

        let back = Event::from_record(event.to_record()).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.level, None);

        let back = Event::from_json_line(&event.to_json_line().unwrap()).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_from_record_rejects_garbage() {
        assert!(Event::from_json_line(r#"{"type":"blob","timestamp":"2026-01-01T00:00:00Z"}"#).is_err());
        assert!(Event::from_json_line(r#"{"type":"log","timestamp":"yesterday"}"#).is_err());
        assert!(Event::from_json_line(r#"{"type":"log","timestamp":"2026-01-01T00:00:00Z","level":"LOUD"}"#).is_err());
        assert!(Event::from_json_line("not json").is_err());
    }
}
