//! Line-oriented parsing shared by the plain-text and JSON paths.
//!
//! Lines are split on raw `\n` bytes before decoding so a multi-byte
//! character cut by a chunk boundary is decoded once the rest arrives.

use chrono::Utc;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::types::{Event, EventData, EventKind, LogLevel};

/// How each complete line is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineFormat {
    /// Level pattern first, then JSON, then plain message
    PlainText,
    /// JSON, then plain message
    Json,
}

/// `[LEVEL] message`, `LEVEL: message` or a bare level token, any case.
pub fn level_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\[?\b(?P<level>DEBUG|INFO|WARNING|WARN|ERROR|CRITICAL|FATAL)\b\]?:?\s*(?P<message>.*)",
        )
        .expect("level pattern is valid")
    })
}

/// Take every complete line out of `buffer` and turn it into events.
///
/// A trailing fragment without `\n` is left in the buffer.
pub fn drain_lines(buffer: &mut Vec<u8>, format: LineFormat) -> Vec<Event> {
    let Some(last_newline) = buffer.iter().rposition(|&b| b == b'\n') else {
        return Vec::new();
    };

    let complete: Vec<u8> = buffer.drain(..=last_newline).collect();
    complete
        .split(|&b| b == b'\n')
        .filter_map(|line| parse_line(line, format))
        .collect()
}

fn parse_line(bytes: &[u8], format: LineFormat) -> Option<Event> {
    let decoded = String::from_utf8_lossy(bytes);
    let line = decoded.trim();
    if line.is_empty() {
        return None;
    }

    if format == LineFormat::PlainText {
        if let Some(event) = level_line(line) {
            return Some(event);
        }
    }

    Some(json_or_message(line))
}

/// Match the level pattern anywhere in the line
pub fn level_line(line: &str) -> Option<Event> {
    let caps = level_pattern().captures(line)?;
    let level = caps
        .name("level")
        .and_then(|m| LogLevel::parse(m.as_str()))
        .unwrap_or(LogLevel::Info);
    let message = caps.name("message").map_or("", |m| m.as_str().trim());

    let mut data = EventData::new();
    data.insert("message".to_string(), Value::String(message.to_string()));
    Some(
        Event::new(EventKind::Log, data)
            .with_level(level)
            .with_raw(line),
    )
}

/// Parse as JSON, falling back to an INFO log carrying the whole line
pub fn json_or_message(line: &str) -> Event {
    match serde_json::from_str::<Value>(line) {
        Ok(value) => classify_json(value, line),
        Err(_) => plain_message(line),
    }
}

fn plain_message(line: &str) -> Event {
    let mut data = EventData::new();
    data.insert("message".to_string(), Value::String(line.to_string()));
    Event::new(EventKind::Log, data)
        .with_level(LogLevel::Info)
        .with_raw(line)
}

/// Classify a parsed JSON value.
///
/// Objects default to `Log`; a `type` naming a known kind overrides that, and
/// any numeric value outside `type` turns a `Log` into a `Metric`. Non-object
/// values are wrapped as `{"value": ...}`.
pub fn classify_json(value: Value, line: &str) -> Event {
    match value {
        Value::Object(map) => {
            let mut kind = map
                .get("type")
                .and_then(Value::as_str)
                .and_then(EventKind::from_name)
                .unwrap_or(EventKind::Log);

            let has_numeric = map.iter().any(|(key, v)| key != "type" && v.is_number());
            if has_numeric && kind == EventKind::Log {
                kind = EventKind::Metric;
            }

            let level = map
                .get("level")
                .and_then(Value::as_str)
                .and_then(LogLevel::parse);

            Event::from_parts(kind, Utc::now(), level, map, Some(line.to_string()), None)
        }
        other => {
            let mut data = EventData::new();
            data.insert("value".to_string(), other);
            Event::new(EventKind::Log, data).with_raw(line)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_line_bracketed() {
        let event = level_line("[ERROR] Sensor failed").unwrap();
        assert_eq!(event.level, Some(LogLevel::Error));
        assert_eq!(event.message(), Some("Sensor failed"));
        assert_eq!(event.raw.as_deref(), Some("[ERROR] Sensor failed"));
    }

    #[test]
    fn test_level_line_colon_and_case() {
        let event = level_line("warning: Low battery").unwrap();
        assert_eq!(event.level, Some(LogLevel::Warning));
        assert_eq!(event.message(), Some("Low battery"));

        let event = level_line("WARN Low battery").unwrap();
        assert_eq!(event.level, Some(LogLevel::Warn));
    }

    #[test]
    fn test_level_line_requires_token() {
        assert!(level_line("boot complete").is_none());
        assert!(level_line("information only").is_none());
    }

    #[test]
    fn test_classify_metric() {
        let event = json_or_message(r#"{"level":"INFO","temp":42.3}"#);
        assert_eq!(event.kind, EventKind::Metric);
        assert_eq!(event.data["temp"], 42.3);
        assert_eq!(event.level, Some(LogLevel::Info));
    }

    #[test]
    fn test_classify_log() {
        let event = json_or_message(r#"{"level":"ERROR","message":"Failed"}"#);
        assert_eq!(event.kind, EventKind::Log);
        assert_eq!(event.level, Some(LogLevel::Error));
    }

    #[test]
    fn test_explicit_type_wins() {
        let event = json_or_message(r#"{"type":"packet","length":4}"#);
        assert_eq!(event.kind, EventKind::Packet);

        // Unknown type names fall back to the heuristic
        let event = json_or_message(r#"{"type":"imu","ax":0.1}"#);
        assert_eq!(event.kind, EventKind::Metric);
    }

    #[test]
    fn test_booleans_are_not_numeric() {
        let event = json_or_message(r#"{"ok":true}"#);
        assert_eq!(event.kind, EventKind::Log);
    }

    #[test]
    fn test_non_object_json() {
        let event = json_or_message("[1,2,3]");
        assert_eq!(event.kind, EventKind::Log);
        assert_eq!(event.data["value"], serde_json::json!([1, 2, 3]));
        assert_eq!(event.level, None);
    }

    #[test]
    fn test_invalid_json_becomes_info_log() {
        let event = json_or_message("{broken");
        assert_eq!(event.kind, EventKind::Log);
        assert_eq!(event.level, Some(LogLevel::Info));
        assert_eq!(event.message(), Some("{broken"));
    }

    #[test]
    fn test_drain_lines_keeps_fragment() {
        let mut buffer = b"one\r\n\n  \ntwo\nthr".to_vec();
        let events = drain_lines(&mut buffer, LineFormat::Json);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].message(), Some("one"));
        assert_eq!(events[1].message(), Some("two"));
        assert_eq!(buffer, b"thr");
    }

    #[test]
    fn test_drain_lines_split_utf8() {
        let text = "temp \u{00b0}C\n".as_bytes();
        let mut buffer = text[..6].to_vec();
        assert!(drain_lines(&mut buffer, LineFormat::PlainText).is_empty());
        buffer.extend_from_slice(&text[6..]);
        let events = drain_lines(&mut buffer, LineFormat::PlainText);
        assert_eq!(events[0].message(), Some("temp \u{00b0}C"));
    }
}
