//! Session data types

/// State of a recorder or replayer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Nothing opened yet
    #[default]
    Idle,
    /// Recorder has an open output file
    Recording,
    /// Recorder closed its file
    Stopped,
    /// Replayer opened, events not yet taken
    Ready,
    /// Replayer's events have been handed out
    Replaying,
}

impl SessionState {
    /// Check if currently recording
    pub fn is_recording(&self) -> bool {
        matches!(self, SessionState::Recording)
    }

    /// Check if events can still be taken from a replayer
    pub fn is_ready(&self) -> bool {
        matches!(self, SessionState::Ready)
    }

    /// Display name for the state
    pub fn display_name(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Recording => "Recording",
            SessionState::Stopped => "Stopped",
            SessionState::Ready => "Ready",
            SessionState::Replaying => "Replaying",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}
