//! Session recorder: writes events to a line-oriented log

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, info, warn};

use super::types::SessionState;
use crate::error::{Result, ResultExt, ScopeError};
use crate::types::Event;

/// `<dir>/session_YYYY-MM-DD_HH-MM-SS.log`, stamped with local time
pub fn default_session_path(sessions_dir: impl AsRef<Path>) -> PathBuf {
    let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    sessions_dir
        .as_ref()
        .join(format!("session_{}.log", stamp))
}

/// Writes one JSON record per event, flushing after every line.
///
/// The file is created (truncated) by [`start`](Self::start) and closed by
/// [`stop`](Self::stop) or on drop.
#[derive(Debug)]
pub struct SessionRecorder {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    state: SessionState,
    event_count: u64,
}

impl SessionRecorder {
    /// Recorder for `path`; parent directories are created immediately
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        Ok(Self {
            path,
            writer: None,
            state: SessionState::Idle,
            event_count: 0,
        })
    }

    /// Recorder with a timestamped file name under `sessions_dir`
    pub fn in_dir(sessions_dir: impl AsRef<Path>) -> Result<Self> {
        Self::new(default_session_path(sessions_dir))
    }

    /// Open the output file
    pub fn start(&mut self) -> Result<()> {
        if self.state.is_recording() {
            warn!(path = %self.path.display(), "Recorder already started");
            return Ok(());
        }

        let file = File::create(&self.path)
            .with_context(|| format!("Failed to create session file {}", self.path.display()))?;
        self.writer = Some(BufWriter::new(file));
        self.state = SessionState::Recording;
        info!(path = %self.path.display(), "Started recording");
        Ok(())
    }

    /// Append one event
    pub fn record(&mut self, event: &Event) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(ScopeError::RecorderNotStarted)?;

        let line = event.to_json_line()?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        self.event_count += 1;
        Ok(())
    }

    /// Flush and close the file; safe to call more than once
    pub fn stop(&mut self) {
        let Some(mut writer) = self.writer.take() else {
            return;
        };
        if let Err(e) = writer.flush() {
            warn!(error = %e, "Failed to flush session file");
        }
        self.state = SessionState::Stopped;
        info!(
            events = self.event_count,
            path = %self.path.display(),
            "Stopped recording"
        );
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state.is_recording()
    }

    /// Events written since construction
    pub fn event_count(&self) -> u64 {
        self.event_count
    }
}

impl Drop for SessionRecorder {
    fn drop(&mut self) {
        if self.writer.is_some() {
            debug!("Closing recorder on drop");
            self.stop();
        }
    }
}
