//! Serial link abstraction
//!
//! This module provides the traits the source is written against, so the
//! reader loop works the same over real hardware (via `serialport`) and the
//! in-memory links used in tests. Implementations must be `Send` to be moved
//! into the reader thread.

use crate::error::Result;
use std::fmt;
use std::time::Duration;

/// USB-serial bridge identifiers matched during auto-detection
pub const KNOWN_CHIP_IDS: [&str; 5] = ["ch340", "ch341", "cp210", "ft232", "ch9102"];

/// Sentinel port name that requests auto-detection
pub const AUTO_PORT: &str = "auto";

/// An open serial connection
///
/// `read` must not block longer than the configured timeout; the reader loop
/// only calls it after `bytes_available` reports pending data.
pub trait SerialLink: Send {
    /// Number of bytes waiting in the driver buffer
    fn bytes_available(&mut self) -> Result<usize>;

    /// Read up to `buf.len()` bytes
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write bytes, returning how many were accepted
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Whether the handle is still usable
    fn is_open(&self) -> bool;

    /// Close the handle; further calls fail with `NotConnected`
    fn close(&mut self);

    /// Device name this link was opened on
    fn name(&self) -> &str;
}

/// Port enumeration and opening
///
/// `Sync` so one provider can be shared between the caller and the reader
/// thread.
#[cfg_attr(test, mockall::automock)]
pub trait PortProvider: Send + Sync {
    /// Enumerate serial devices currently present
    fn available_ports(&self) -> Result<Vec<PortInfo>>;

    /// Open `port` with the given baud rate and read/write timeout
    fn open(&self, port: &str, baud_rate: u32, timeout: Duration) -> Result<Box<dyn SerialLink>>;
}

/// Information about an enumerated serial device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortInfo {
    /// Device path or name (e.g. `/dev/ttyUSB0`, `COM3`)
    pub device: String,
    /// Human-readable description
    pub description: String,
    /// Hardware id string (e.g. `USB VID:PID=1A86:7523 SER=...`)
    pub hwid: String,
}

impl PortInfo {
    pub fn new(
        device: impl Into<String>,
        description: impl Into<String>,
        hwid: impl Into<String>,
    ) -> Self {
        Self {
            device: device.into(),
            description: description.into(),
            hwid: hwid.into(),
        }
    }

    /// Whether description or hardware id names a known USB-serial chip
    pub fn is_known_bridge(&self) -> bool {
        let description = self.description.to_lowercase();
        let hwid = self.hwid.to_lowercase();
        KNOWN_CHIP_IDS
            .iter()
            .any(|id| description.contains(id) || hwid.contains(id))
    }
}

impl fmt::Display for PortInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.description.is_empty() {
            write!(f, "{}", self.device)
        } else {
            write!(f, "{} - {}", self.device, self.description)
        }
    }
}

/// Pick a port: first known bridge chip, else the first port listed.
pub fn auto_detect_port(ports: &[PortInfo]) -> Option<&PortInfo> {
    if let Some(port) = ports.iter().find(|p| p.is_known_bridge()) {
        return Some(port);
    }

    let first = ports.first()?;
    tracing::warn!(
        port = %first.device,
        "Auto-detection found no known USB-serial chip, using first available port"
    );
    Some(first)
}

/// Whether a configured port name asks for auto-detection
pub fn wants_auto_detect(port: Option<&str>) -> bool {
    port.map_or(true, |p| p.trim().is_empty() || p.eq_ignore_ascii_case(AUTO_PORT))
}

/// Counters kept by the reader loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceStats {
    /// Chunks read from the link
    pub chunks_read: u64,
    /// Total bytes read
    pub bytes_read: u64,
    /// Reconnect attempts made by the reader
    pub reconnect_attempts: u64,
    /// Reconnect attempts that opened the port
    pub reconnects: u64,
    /// Driver-level read failures
    pub read_errors: u64,
    /// Callback invocations that returned an error or panicked
    pub callback_failures: u64,
    /// Chunks discarded because the queue was full
    pub dropped_chunks: u64,
}

impl SourceStats {
    /// Record a chunk handed to the queue and callbacks
    pub fn record_chunk(&mut self, len: usize) {
        self.chunks_read += 1;
        self.bytes_read += len as u64;
    }

    /// Reset all statistics
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ports() -> Vec<PortInfo> {
        vec![
            PortInfo::new("/dev/ttyS0", "ttyS0", "PNP0501"),
            PortInfo::new(
                "/dev/ttyUSB0",
                "USB Serial",
                "USB VID:PID=1A86:7523 SER=5 LOCATION=1-1",
            ),
            PortInfo::new("/dev/ttyUSB1", "CP2102 USB to UART Bridge", "USB VID:PID=10C4:EA60"),
        ]
    }

    #[test]
    fn test_known_bridge_by_description() {
        let port = PortInfo::new("COM4", "Silicon Labs CP210x USB to UART", "");
        assert!(port.is_known_bridge());
    }

    #[test]
    fn test_known_bridge_by_hwid() {
        let port = PortInfo::new("/dev/ttyACM0", "", "USB CH9102 VID:PID=1A86:55D4");
        assert!(port.is_known_bridge());
        assert!(!PortInfo::new("/dev/ttyS0", "ttyS0", "PNP0501").is_known_bridge());
    }

    #[test]
    fn test_auto_detect_prefers_known_chip() {
        let ports = ports();
        assert_eq!(auto_detect_port(&ports).unwrap().device, "/dev/ttyUSB1");
    }

    #[test]
    fn test_auto_detect_falls_back_to_first() {
        let ports = vec![
            PortInfo::new("/dev/ttyS0", "ttyS0", ""),
            PortInfo::new("/dev/ttyS1", "ttyS1", ""),
        ];
        assert_eq!(auto_detect_port(&ports).unwrap().device, "/dev/ttyS0");
        assert!(auto_detect_port(&[]).is_none());
    }

    #[test]
    fn test_wants_auto_detect() {
        assert!(wants_auto_detect(None));
        assert!(wants_auto_detect(Some("auto")));
        assert!(wants_auto_detect(Some("AUTO")));
        assert!(wants_auto_detect(Some("")));
        assert!(!wants_auto_detect(Some("/dev/ttyUSB0")));
    }

    #[test]
    fn test_stats_record_chunk() {
        let mut stats = SourceStats::default();
        stats.record_chunk(12);
        stats.record_chunk(4);
        assert_eq!(stats.chunks_read, 2);
        assert_eq!(stats.bytes_read, 16);

        stats.reset();
        assert_eq!(stats, SourceStats::default());
    }
}
