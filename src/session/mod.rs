//! Session recording and replay
//!
//! A session file holds one JSON event record per line:
//!
//! ```text
//! {"type":"log","timestamp":"2024-05-01T12:00:00Z","level":"INFO","data":{"message":"boot"},"raw":"[INFO] boot","source":null}
//! ```
//!
//! [`SessionRecorder`] appends events as they pass through the pipeline;
//! [`SessionReplayer`] reads them back with their original spacing, scaled by
//! a speed factor.

pub mod player;
pub mod recorder;
pub mod types;

pub use player::{ReplayEvents, SessionReplayer};
pub use recorder::{default_session_path, SessionRecorder};
pub use types::SessionState;
