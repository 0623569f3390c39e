//! Format auto-detection heuristics.
//!
//! Detection looks at the first buffered bytes once at least
//! [`MIN_DETECT_BYTES`] have arrived. It is a best-effort guess; callers that
//! know their format should configure it instead of relying on `Auto`.

use super::text::level_pattern;
use super::Format;

/// Bytes required before a decision is attempted
pub const MIN_DETECT_BYTES: usize = 10;

/// Number of leading bytes sampled for printable ratios
pub const SAMPLE_WINDOW: usize = 100;

/// Printable share that marks valid UTF-8 as text
const UTF8_TEXT_RATIO: f64 = 0.8;

/// Printable share that marks invalid UTF-8 as (damaged) text
const DAMAGED_TEXT_RATIO: f64 = 0.5;

/// Printable ASCII, tab, LF or CR
pub fn is_text_byte(byte: u8) -> bool {
    (32..=126).contains(&byte) || matches!(byte, b'\t' | b'\n' | b'\r')
}

/// Share of text bytes within the first [`SAMPLE_WINDOW`] bytes
pub fn printable_ratio(bytes: &[u8]) -> f64 {
    let sample = &bytes[..bytes.len().min(SAMPLE_WINDOW)];
    if sample.is_empty() {
        return 0.0;
    }
    let printable = sample.iter().filter(|&&b| is_text_byte(b)).count();
    printable as f64 / sample.len() as f64
}

/// Why a format was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionReason {
    /// First line parsed as JSON
    JsonLine,
    /// A `LEVEL: message` pattern was found
    LevelPattern,
    /// Mostly printable valid UTF-8
    PrintableText,
    /// Valid UTF-8 with no stronger signal
    TextFallback,
    /// Invalid UTF-8 but mostly printable
    DamagedText,
    /// Invalid UTF-8 and mostly non-printable
    BinaryData,
}

/// Inspect the buffer and pick a format, or `None` to wait for more bytes.
pub fn detect_format(buffer: &[u8]) -> Option<(Format, DetectionReason)> {
    if buffer.len() < MIN_DETECT_BYTES {
        return None;
    }

    let decision = match std::str::from_utf8(buffer) {
        Ok(text) => {
            let trimmed = text.trim();
            let first_line = text.split('\n').next().unwrap_or_default();

            if (trimmed.starts_with('{') || trimmed.starts_with('['))
                && serde_json::from_str::<serde_json::Value>(first_line).is_ok()
            {
                (Format::Json, DetectionReason::JsonLine)
            } else if level_pattern().is_match(text) {
                (Format::PlainText, DetectionReason::LevelPattern)
            } else if printable_ratio(buffer) >= UTF8_TEXT_RATIO {
                (Format::PlainText, DetectionReason::PrintableText)
            } else {
                (Format::PlainText, DetectionReason::TextFallback)
            }
        }
        Err(_) => {
            if printable_ratio(buffer) >= DAMAGED_TEXT_RATIO {
                (Format::PlainText, DetectionReason::DamagedText)
            } else {
                (Format::Binary, DetectionReason::BinaryData)
            }
        }
    };

    Some(decision)
}
