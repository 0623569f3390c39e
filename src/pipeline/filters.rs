//! Built-in filter stages.
//!
//! - `LevelFilter` keeps (or, inverted, blocks) a set of log levels.
//! - `SearchFilter` keeps events whose text matches a regular expression.
//! - `DuplicateFilter` drops an event identical to the one before it.

use regex::Regex;
use std::collections::HashSet;

use crate::error::{Result, ScopeError};
use crate::pipeline::stage::StageOutcome;
use crate::types::{Event, LogLevel};

/// Level filter stage.
///
/// In allow mode only events whose level is in the set pass; events without a
/// level are dropped. In block mode listed levels are dropped and everything
/// else passes. An empty allow set passes everything.
#[derive(Debug, Clone)]
pub struct LevelFilter {
    name: String,
    levels: HashSet<LogLevel>,
    /// Block listed levels instead of allowing them
    invert_mode: bool,
}

impl Default for LevelFilter {
    fn default() -> Self {
        Self {
            name: "level-filter".to_string(),
            levels: HashSet::new(),
            invert_mode: false,
        }
    }
}

impl LevelFilter {
    /// Keep only these levels
    pub fn allow(levels: impl IntoIterator<Item = LogLevel>) -> Self {
        Self {
            levels: levels.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Drop these levels
    pub fn block(levels: impl IntoIterator<Item = LogLevel>) -> Self {
        Self {
            levels: levels.into_iter().collect(),
            invert_mode: true,
            ..Self::default()
        }
    }

    /// Register under a different stage name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Parse level names such as `["ERROR", "warn"]`
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let levels = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                LogLevel::parse(name)
                    .ok_or_else(|| ScopeError::Config(format!("Unknown log level '{}'", name)))
            })
            .collect::<Result<HashSet<_>>>()?;
        Ok(Self::allow(levels))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn process(&mut self, event: &Event) -> StageOutcome {
        if self.levels.is_empty() {
            return StageOutcome::Keep;
        }

        let listed = event.level.is_some_and(|level| self.levels.contains(&level));
        if listed != self.invert_mode {
            StageOutcome::Keep
        } else {
            StageOutcome::Drop
        }
    }

    pub fn levels(&self) -> &HashSet<LogLevel> {
        &self.levels
    }

    pub fn invert_mode(&self) -> bool {
        self.invert_mode
    }
}

/// Regex search stage.
///
/// Matches against the raw text when present, otherwise the message, otherwise
/// the JSON payload.
#[derive(Debug, Clone)]
pub struct SearchFilter {
    pattern: Regex,
}

impl SearchFilter {
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn name(&self) -> &str {
        "search-filter"
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn process(&mut self, event: &Event) -> StageOutcome {
        let matched = match (event.raw.as_deref(), event.message()) {
            (Some(raw), _) => self.pattern.is_match(raw),
            (None, Some(message)) => self.pattern.is_match(message),
            (None, None) => serde_json::to_string(&event.data)
                .map(|json| self.pattern.is_match(&json))
                .unwrap_or(false),
        };

        if matched {
            StageOutcome::Keep
        } else {
            StageOutcome::Drop
        }
    }
}

/// Drops consecutive repeats of the same line.
///
/// Events are compared by kind, level and raw text (payload when there is no
/// raw text); timestamps are ignored.
#[derive(Debug, Clone, Default)]
pub struct DuplicateFilter {
    last: Option<String>,
    suppressed: u64,
}

impl DuplicateFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&self) -> &str {
        "dedup"
    }

    fn key(event: &Event) -> String {
        let body = match &event.raw {
            Some(raw) => raw.clone(),
            None => serde_json::to_string(&event.data).unwrap_or_default(),
        };
        format!(
            "{}|{}|{}",
            event.kind.as_str(),
            event.level.map_or("", |l| l.as_str()),
            body
        )
    }

    pub fn process(&mut self, event: &Event) -> StageOutcome {
        let key = Self::key(event);
        if self.last.as_deref() == Some(key.as_str()) {
            self.suppressed += 1;
            return StageOutcome::Drop;
        }
        self.last = Some(key);
        StageOutcome::Keep
    }

    /// Number of events dropped so far
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }

    /// Forget the previous event
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventKind;
    use serde_json::json;

    fn metric(value: f64) -> Event {
        let mut data = crate::types::EventData::new();
        data.insert("temp".to_string(), json!(value));
        Event::new(EventKind::Metric, data)
    }

    #[test]
    fn test_level_allow() {
        let mut filter = LevelFilter::allow([LogLevel::Error, LogLevel::Warn]);
        assert_eq!(filter.process(&Event::log(LogLevel::Error, "x")), StageOutcome::Keep);
        assert_eq!(filter.process(&Event::log(LogLevel::Info, "x")), StageOutcome::Drop);
        // WARN and WARNING are distinct levels
        assert_eq!(filter.process(&Event::log(LogLevel::Warning, "x")), StageOutcome::Drop);
        // No level, no match
        assert_eq!(filter.process(&metric(1.0)), StageOutcome::Drop);
    }

    #[test]
    fn test_level_block() {
        let mut filter = LevelFilter::block([LogLevel::Debug]);
        assert_eq!(filter.process(&Event::log(LogLevel::Debug, "x")), StageOutcome::Drop);
        assert_eq!(filter.process(&Event::log(LogLevel::Info, "x")), StageOutcome::Keep);
        assert_eq!(filter.process(&metric(1.0)), StageOutcome::Keep);
        assert!(filter.invert_mode());
        assert_eq!(filter.name(), "level-filter");
        assert_eq!(filter.named("drop-debug").name(), "drop-debug");
    }

    #[test]
    fn test_empty_level_filter_passes_everything() {
        let mut filter = LevelFilter::default();
        assert_eq!(filter.process(&metric(1.0)), StageOutcome::Keep);
    }

    #[test]
    fn test_level_from_names() {
        let filter = LevelFilter::from_names(&["error", " WARN "]).unwrap();
        assert!(filter.levels().contains(&LogLevel::Error));
        assert!(filter.levels().contains(&LogLevel::Warn));
        assert!(LevelFilter::from_names(&["LOUD"]).is_err());
    }

    #[test]
    fn test_search_raw_then_message() {
        let mut filter = SearchFilter::new(r"sensor\s+\d").unwrap();
        let raw = Event::log(LogLevel::Info, "ignored").with_raw("[INFO] sensor 3 ready");
        assert_eq!(filter.process(&raw), StageOutcome::Keep);

        assert_eq!(
            filter.process(&Event::log(LogLevel::Info, "sensor 7 offline")),
            StageOutcome::Keep
        );
        assert_eq!(
            filter.process(&Event::log(LogLevel::Info, "boot")),
            StageOutcome::Drop
        );
    }

    #[test]
    fn test_search_payload() {
        let mut filter = SearchFilter::new("temp").unwrap();
        assert_eq!(filter.process(&metric(3.0)), StageOutcome::Keep);
        assert_eq!(filter.pattern(), "temp");
    }

    #[test]
    fn test_invalid_search_pattern() {
        assert!(matches!(SearchFilter::new("(unclosed"), Err(ScopeError::Regex(_))));
    }

    #[test]
    fn test_duplicates_are_dropped() {
        let mut filter = DuplicateFilter::new();
        let a = Event::log(LogLevel::Info, "a").with_raw("a");
        let b = Event::log(LogLevel::Info, "b").with_raw("b");

        assert_eq!(filter.process(&a), StageOutcome::Keep);
        assert_eq!(filter.process(&a.clone()), StageOutcome::Drop);
        assert_eq!(filter.process(&b), StageOutcome::Keep);
        assert_eq!(filter.process(&a), StageOutcome::Keep);
        assert_eq!(filter.suppressed(), 1);

        filter.reset();
        assert_eq!(filter.process(&a), StageOutcome::Keep);
    }
}
