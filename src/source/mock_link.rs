//! In-memory serial ports for tests and demos
//!
//! Only compiled with the `mock-link` feature (and in this crate's unit tests).
//!
//! [`MockPorts`] is a [`PortProvider`] whose links deliver chunks pushed from
//! the test. Failures are scripted: opens can be refused, the device can be
//! unplugged (reads fail with a link error), and transient errors can be
//! injected.
//!
//! # Example
//!
//! ```
//! use serialscope::config::SourceConfig;
//! use serialscope::source::{MockPorts, SerialSource};
//! use std::time::Duration;
//!
//! let ports = MockPorts::new();
//! let source = SerialSource::with_provider(SourceConfig::default(), Box::new(ports.clone()));
//! source.start_reading().unwrap();
//!
//! ports.push_chunk(b"[INFO] hello\n".to_vec());
//! let chunk = source.read(Some(Duration::from_secs(1)));
//! assert_eq!(chunk.as_deref(), Some(&b"[INFO] hello\n"[..]));
//! source.disconnect();
//! ```

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::link::{PortInfo, PortProvider, SerialLink};
use crate::error::{Result, ScopeError};

/// Default device exposed by [`MockPorts::new`]
pub const MOCK_DEVICE: &str = "/dev/mock0";

#[derive(Debug, Default)]
struct MockBus {
    ports: Vec<PortInfo>,
    pending: VecDeque<Vec<u8>>,
    written: Vec<u8>,
    opened: Vec<String>,
    refused_opens: usize,
    transient_errors: usize,
    unplugged: bool,
}

/// Scriptable in-memory port provider
///
/// Clones share the same bus, so a test keeps one handle while the source
/// owns another.
#[derive(Debug, Clone)]
pub struct MockPorts {
    bus: Arc<Mutex<MockBus>>,
}

impl Default for MockPorts {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPorts {
    /// One CH340-looking device at [`MOCK_DEVICE`]
    pub fn new() -> Self {
        Self::with_ports(vec![PortInfo::new(
            MOCK_DEVICE,
            "Mock USB-Serial CH340",
            "MOCK VID:PID=1A86:7523",
        )])
    }

    pub fn with_ports(ports: Vec<PortInfo>) -> Self {
        Self {
            bus: Arc::new(Mutex::new(MockBus {
                ports,
                ..MockBus::default()
            })),
        }
    }

    fn bus(&self) -> MutexGuard<'_, MockBus> {
        self.bus.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue bytes to be delivered as one chunk
    pub fn push_chunk(&self, bytes: impl Into<Vec<u8>>) {
        self.bus().pending.push_back(bytes.into());
    }

    /// Chunks not yet read
    pub fn pending_chunks(&self) -> usize {
        self.bus().pending.len()
    }

    /// Refuse the next `count` open attempts
    pub fn refuse_opens(&self, count: usize) {
        self.bus().refused_opens = count;
    }

    /// Make the next `count` availability checks fail with a timeout
    pub fn inject_transient_errors(&self, count: usize) {
        self.bus().transient_errors = count;
    }

    /// Simulate the device disappearing; open links fail and opens are refused
    pub fn unplug(&self) {
        self.bus().unplugged = true;
    }

    /// Bring the device back
    pub fn plug_in(&self) {
        self.bus().unplugged = false;
    }

    /// Every port name that was opened, in order
    pub fn opened(&self) -> Vec<String> {
        self.bus().opened.clone()
    }

    pub fn open_count(&self) -> usize {
        self.bus().opened.len()
    }

    /// Bytes written through any link
    pub fn written(&self) -> Vec<u8> {
        self.bus().written.clone()
    }
}

impl PortProvider for MockPorts {
    fn available_ports(&self) -> Result<Vec<PortInfo>> {
        let bus = self.bus();
        if bus.unplugged {
            return Ok(Vec::new());
        }
        Ok(bus.ports.clone())
    }

    fn open(&self, port: &str, _baud_rate: u32, _timeout: Duration) -> Result<Box<dyn SerialLink>> {
        let mut bus = self.bus();
        if bus.unplugged || !bus.ports.iter().any(|p| p.device == port) {
            return Err(ScopeError::Open {
                port: port.to_string(),
                message: "No such device".to_string(),
            });
        }
        if bus.refused_opens > 0 {
            bus.refused_opens -= 1;
            return Err(ScopeError::Open {
                port: port.to_string(),
                message: "Device busy".to_string(),
            });
        }

        bus.opened.push(port.to_string());
        Ok(Box::new(MockLink {
            name: port.to_string(),
            bus: Arc::clone(&self.bus),
            open: true,
        }))
    }
}

/// Link handed out by [`MockPorts`]
#[derive(Debug)]
pub struct MockLink {
    name: String,
    bus: Arc<Mutex<MockBus>>,
    open: bool,
}

impl MockLink {
    fn bus(&self) -> Result<MutexGuard<'_, MockBus>> {
        if !self.open {
            return Err(ScopeError::NotConnected);
        }
        let bus = self.bus.lock().unwrap_or_else(PoisonError::into_inner);
        if bus.unplugged {
            return Err(ScopeError::Link(format!("{} was unplugged", self.name)));
        }
        Ok(bus)
    }
}

impl SerialLink for MockLink {
    fn bytes_available(&mut self) -> Result<usize> {
        let mut bus = self.bus()?;
        if bus.transient_errors > 0 {
            bus.transient_errors -= 1;
            return Err(io::Error::new(io::ErrorKind::TimedOut, "mock timeout").into());
        }
        Ok(bus.pending.front().map_or(0, Vec::len))
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut bus = self.bus()?;
        let Some(mut chunk) = bus.pending.pop_front() else {
            return Ok(0);
        };

        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            bus.pending.push_front(chunk.split_off(n));
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut bus = self.bus()?;
        bus.written.extend_from_slice(data);
        Ok(data.len())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn name(&self) -> &str {
        &self.name
    }
}
