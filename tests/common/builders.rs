//! Test data builders for creating test objects

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use serialscope::types::EventData;
use serialscope::{Event, EventKind, LogLevel};

/// Builder for creating test Events
pub struct EventBuilder {
    kind: EventKind,
    level: Option<LogLevel>,
    data: EventData,
    raw: Option<String>,
    source: Option<String>,
    timestamp: DateTime<Utc>,
}

impl EventBuilder {
    pub fn log(level: LogLevel, message: &str) -> Self {
        Self::new(EventKind::Log)
            .level(level)
            .field("message", Value::from(message))
    }

    pub fn metric(name: &str, value: f64) -> Self {
        Self::new(EventKind::Metric).field(name, Value::from(value))
    }

    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            level: None,
            data: EventData::new(),
            raw: None,
            source: None,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = Some(level);
        self
    }

    pub fn field(mut self, key: &str, value: Value) -> Self {
        self.data.insert(key.to_string(), value);
        self
    }

    pub fn raw(mut self, raw: &str) -> Self {
        self.raw = Some(raw.to_string());
        self
    }

    pub fn source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    /// Milliseconds after 2024-05-01T12:00:00Z
    pub fn at_millis(mut self, millis: i64) -> Self {
        self.timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
            + chrono::Duration::milliseconds(millis);
        self
    }

    pub fn build(self) -> Event {
        Event::from_parts(
            self.kind,
            self.timestamp,
            self.level,
            self.data,
            self.raw,
            self.source,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_builder() {
        let event = EventBuilder::log(LogLevel::Warn, "low battery")
            .raw("[WARN] low battery")
            .at_millis(1500)
            .build();

        assert_eq!(event.kind, EventKind::Log);
        assert_eq!(event.level, Some(LogLevel::Warn));
        assert_eq!(event.message(), Some("low battery"));
        assert_eq!(event.timestamp.timestamp_subsec_millis(), 500);
    }
}
