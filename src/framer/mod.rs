//! Stream framing
//!
//! Turns an arbitrary sequence of byte chunks into [`Event`]s. Chunk
//! boundaries carry no meaning: bytes are buffered until a complete line or
//! packet is available, so feeding the same bytes split differently yields the
//! same events.
//!
//! In [`FramerMode::Auto`] the format is guessed once enough bytes have
//! arrived (see [`detect`]) and then kept until [`StreamFramer::reset`].

pub mod binary;
pub mod detect;
pub mod text;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use crate::error::ScopeError;
use crate::types::Event;
use text::LineFormat;

/// Configured framing mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FramerMode {
    /// Newline-delimited text with level extraction
    #[serde(rename = "plain")]
    PlainText,
    /// Newline-delimited JSON
    Json,
    /// Length-prefixed binary packets
    Binary,
    /// Detect from the first bytes
    #[default]
    Auto,
}

impl FramerMode {
    pub const ALL: [FramerMode; 4] = [
        FramerMode::PlainText,
        FramerMode::Json,
        FramerMode::Binary,
        FramerMode::Auto,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FramerMode::PlainText => "plain",
            FramerMode::Json => "json",
            FramerMode::Binary => "binary",
            FramerMode::Auto => "auto",
        }
    }
}

impl fmt::Display for FramerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FramerMode {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        FramerMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == name)
            .ok_or_else(|| ScopeError::Config(format!("Unknown framer mode '{}'", s)))
    }
}

/// A concrete wire format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[serde(rename = "plain")]
    PlainText,
    Json,
    Binary,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::PlainText => "plain",
            Format::Json => "json",
            Format::Binary => "binary",
        };
        f.write_str(name)
    }
}

/// Where the framer stands on choosing a format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Nothing decided yet (`Auto` waiting for bytes, or nothing fed)
    Pending,
    /// Format chosen by detection
    Resolved(Format),
    /// Binary framing found text and handed over to the line path
    EscapedToText,
}

/// Incremental byte-to-event framer.
///
/// Not thread-safe; one framer belongs to one stream.
#[derive(Debug, Clone)]
pub struct StreamFramer {
    mode: FramerMode,
    resolution: Resolution,
    buffer: Vec<u8>,
}

impl Default for StreamFramer {
    fn default() -> Self {
        Self::new(FramerMode::Auto)
    }
}

impl StreamFramer {
    pub fn new(mode: FramerMode) -> Self {
        Self {
            mode,
            resolution: Resolution::Pending,
            buffer: Vec::new(),
        }
    }

    /// Append a chunk and return every event it completes, in stream order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Event> {
        self.buffer.extend_from_slice(chunk);

        if self.mode == FramerMode::Auto && self.resolution == Resolution::Pending {
            if let Some((format, reason)) = detect::detect_format(&self.buffer) {
                info!(%format, ?reason, "Auto-detected stream format");
                self.resolution = Resolution::Resolved(format);
            }
        }

        match self.active_format() {
            Format::PlainText => text::drain_lines(&mut self.buffer, LineFormat::PlainText),
            Format::Json => text::drain_lines(&mut self.buffer, LineFormat::Json),
            Format::Binary => self.frame_binary(),
        }
    }

    fn frame_binary(&mut self) -> Vec<Event> {
        let pass = binary::frame_packets(&mut self.buffer);
        let mut events = pass.packets;
        if pass.escaped {
            warn!("Binary framer detected text data, switching to plain text");
            self.resolution = Resolution::EscapedToText;
            events.extend(text::drain_lines(&mut self.buffer, LineFormat::PlainText));
        }
        events
    }

    /// Format used for the next `feed`.
    ///
    /// An undecided `Auto` framer parses as plain text.
    fn active_format(&self) -> Format {
        match self.resolution {
            Resolution::Resolved(format) => format,
            Resolution::EscapedToText => Format::PlainText,
            Resolution::Pending => match self.mode {
                FramerMode::PlainText | FramerMode::Auto => Format::PlainText,
                FramerMode::Json => Format::Json,
                FramerMode::Binary => Format::Binary,
            },
        }
    }

    /// Clear buffered bytes and any detection or escape decision.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.resolution = Resolution::Pending;
    }

    pub fn mode(&self) -> FramerMode {
        self.mode
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Detected (or escaped-to) format, `None` until something was decided
    pub fn resolved_mode(&self) -> Option<Format> {
        match self.resolution {
            Resolution::Pending => None,
            Resolution::Resolved(format) => Some(format),
            Resolution::EscapedToText => Some(Format::PlainText),
        }
    }

    /// Bytes waiting for a line terminator or the rest of a packet
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }
}
