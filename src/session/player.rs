//! Session replayer: reads a recorded log back as events

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use super::types::SessionState;
use crate::error::{Result, ResultExt, ScopeError};
use crate::types::Event;

/// Opens a session file and hands out its events once.
#[derive(Debug)]
pub struct SessionReplayer {
    path: PathBuf,
    speed: f64,
    reader: Option<BufReader<File>>,
    state: SessionState,
}

impl SessionReplayer {
    /// Open `path` for replay at `speed` (1.0 = real time, <= 0 = no delays)
    ///
    /// NaN and infinite speeds are rejected.
    pub fn open(path: impl Into<PathBuf>, speed: f64) -> Result<Self> {
        let path = path.into();
        if !speed.is_finite() {
            return Err(ScopeError::Session(format!("Invalid replay speed {}", speed)));
        }
        if !path.is_file() {
            return Err(ScopeError::Session(format!(
                "Session file not found: {}",
                path.display()
            )));
        }

        let file = File::open(&path)
            .with_context(|| format!("Failed to open session file {}", path.display()))?;
        info!(path = %path.display(), speed, "Started replaying");

        Ok(Self {
            path,
            speed,
            reader: Some(BufReader::new(file)),
            state: SessionState::Ready,
        })
    }

    /// Take the event sequence. Only the first call succeeds.
    pub fn events(&mut self) -> Result<ReplayEvents> {
        let reader = self.reader.take().ok_or(ScopeError::ReplayerNotOpen)?;
        self.state = SessionState::Replaying;
        Ok(ReplayEvents {
            reader,
            speed: self.speed,
            last_timestamp: None,
            line: Vec::new(),
            line_no: 0,
            skipped: 0,
        })
    }

    /// Close the file without replaying
    pub fn stop(&mut self) {
        if self.reader.take().is_some() {
            debug!(path = %self.path.display(), "Replayer closed");
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn state(&self) -> SessionState {
        self.state
    }
}

/// Lazy iterator over a session file.
///
/// Blank lines, malformed records (bad JSON or bad UTF-8) and a final line
/// without a newline are skipped. Before each event after the first it sleeps
/// for the recorded gap divided by the speed, saturating at `Duration::MAX`.
#[derive(Debug)]
pub struct ReplayEvents {
    reader: BufReader<File>,
    speed: f64,
    last_timestamp: Option<DateTime<Utc>>,
    line: Vec<u8>,
    line_no: usize,
    skipped: usize,
}

impl ReplayEvents {
    /// Malformed lines skipped so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn delay_before(&self, timestamp: DateTime<Utc>) -> Option<Duration> {
        if self.speed <= 0.0 {
            return None;
        }
        let last = self.last_timestamp?;
        let gap = (timestamp - last).to_std().ok()?;
        if gap.is_zero() {
            return None;
        }
        let scaled = gap.as_secs_f64() / self.speed;
        Some(Duration::try_from_secs_f64(scaled).unwrap_or(Duration::MAX))
    }
}

impl Iterator for ReplayEvents {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        loop {
            self.line.clear();
            match self.reader.read_until(b'\n', &mut self.line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "Failed to read session file");
                    return None;
                }
            }
            self.line_no += 1;

            if self.line.last() != Some(&b'\n') {
                debug!(line = self.line_no, "Ignoring trailing partial line");
                return None;
            }
            let text = match std::str::from_utf8(&self.line) {
                Ok(text) => text.trim(),
                Err(e) => {
                    self.skipped += 1;
                    warn!(line = self.line_no, error = %e, "Skipping line with invalid UTF-8");
                    continue;
                }
            };
            if text.is_empty() {
                continue;
            }

            match Event::from_json_line(text) {
                Ok(event) => {
                    if let Some(delay) = self.delay_before(event.timestamp) {
                        std::thread::sleep(delay);
                    }
                    self.last_timestamp = Some(event.timestamp);
                    return Some(event);
                }
                Err(e) => {
                    self.skipped += 1;
                    error!(line = self.line_no, error = %e, "Failed to parse event");
                }
            }
        }
    }
}
