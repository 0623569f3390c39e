//! Serial stream source
//!
//! This module owns the serial connection and a background reader thread.
//! Raw chunks are handed to consumers through a crossbeam channel and, in
//! parallel, to registered callbacks.
//!
//! # Architecture
//!
//! - [`SerialSource`] - Public handle: connect, start/stop reading, read, write
//! - [`PortProvider`] / [`SerialLink`] - Driver seam (real ports, or `MockPorts` with the `mock-link` feature)
//! - `worker::ReaderWorker` - Read loop with auto-reconnect
//!
//! Connection state, callbacks and statistics live behind one mutex shared
//! with the reader. The chunk queue is its own channel.
//!
//! # Example
//!
//! ```ignore
//! use serialscope::config::SourceConfig;
//! use serialscope::source::SerialSource;
//!
//! let source = SerialSource::new(SourceConfig::for_port("/dev/ttyUSB0"));
//! source.start_reading()?;
//!
//! while let Some(chunk) = source.read(None) {
//!     println!("{} bytes", chunk.len());
//! }
//! ```

pub mod link;
#[cfg(any(test, feature = "mock-link"))]
pub mod mock_link;
pub mod system;
mod worker;

pub use link::{
    auto_detect_port, wants_auto_detect, PortInfo, PortProvider, SerialLink, SourceStats,
    AUTO_PORT, KNOWN_CHIP_IDS,
};
#[cfg(any(test, feature = "mock-link"))]
pub use mock_link::{MockLink, MockPorts, MOCK_DEVICE};
pub use system::{SystemLink, SystemPorts};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info, warn};

use crate::config::SourceConfig;
use crate::error::{Result, ResultExt, ScopeError};
use worker::ReaderWorker;

/// How long `stop_reading` waits for the reader to exit
pub const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Callback invoked with every chunk, on the reader thread
pub type ChunkCallback = Arc<dyn Fn(&[u8]) -> anyhow::Result<()> + Send + Sync>;

/// Handle returned by [`SerialSource::register_callback`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

/// State guarded by the source lock
pub(crate) struct LinkState {
    pub(crate) link: Option<Box<dyn SerialLink>>,
    pub(crate) port_name: Option<String>,
    pub(crate) callbacks: Vec<(CallbackId, ChunkCallback)>,
    pub(crate) next_callback_id: u64,
    pub(crate) stats: SourceStats,
}

/// Everything the caller and the reader thread share
pub(crate) struct Shared {
    pub(crate) config: SourceConfig,
    pub(crate) ports: Box<dyn PortProvider>,
    pub(crate) state: Mutex<LinkState>,
    pub(crate) queue_tx: Sender<Vec<u8>>,
}

impl Shared {
    /// Lock the connection state, recovering from a poisoned lock
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, LinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open the configured (or auto-detected) port unless already open
    pub(crate) fn connect(&self) -> Result<()> {
        let mut state = self.lock_state();
        if state.link.as_ref().is_some_and(|link| link.is_open()) {
            debug!("Already connected");
            return Ok(());
        }

        let port = match self.config.port.as_deref() {
            Some(port) if !wants_auto_detect(Some(port)) => port.to_string(),
            _ => {
                let ports = self.ports.available_ports()?;
                let Some(found) = auto_detect_port(&ports) else {
                    error!("No serial port found");
                    return Err(ScopeError::NoDevice);
                };
                info!(port = %found.device, "Auto-detected port");
                found.device.clone()
            }
        };

        let link = self
            .ports
            .open(&port, self.config.baud_rate, self.config.read_timeout())
            .map_err(|e| {
                error!(port = %port, error = %e, "Failed to connect");
                e
            })?;

        info!(port = %port, baud = self.config.baud_rate, "Connected");
        state.link = Some(link);
        state.port_name = Some(port);
        Ok(())
    }
}

struct ReaderHandle {
    running: Arc<AtomicBool>,
    done_rx: Receiver<()>,
    thread: JoinHandle<()>,
}

impl ReaderHandle {
    fn is_active(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.thread.is_finished()
    }

    /// Signal the reader and wait up to `timeout` for it to exit
    fn stop(self, timeout: Duration) {
        self.running.store(false, Ordering::SeqCst);
        match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if self.thread.join().is_err() {
                    error!("Serial reader thread panicked");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Serial reader did not stop within {:?}, leaving it to finish in the background",
                    timeout
                );
            }
        }
    }
}

/// Thread-safe serial source with a background reader
///
/// All methods take `&self`; the source can be shared between threads.
/// Dropping it stops the reader and closes the port.
pub struct SerialSource {
    shared: Arc<Shared>,
    reader: Mutex<Option<ReaderHandle>>,
    queue_rx: Receiver<Vec<u8>>,
}

impl SerialSource {
    /// Source backed by the operating system's serial ports
    pub fn new(config: SourceConfig) -> Self {
        Self::with_provider(config, Box::new(SystemPorts::new()))
    }

    /// Source backed by a custom port provider
    pub fn with_provider(config: SourceConfig, ports: Box<dyn PortProvider>) -> Self {
        let (queue_tx, queue_rx) = match config.queue_capacity {
            Some(capacity) => bounded(capacity.max(1)),
            None => unbounded(),
        };

        let shared = Shared {
            config,
            ports,
            state: Mutex::new(LinkState {
                link: None,
                port_name: None,
                callbacks: Vec::new(),
                next_callback_id: 0,
                stats: SourceStats::default(),
            }),
            queue_tx,
        };

        Self {
            shared: Arc::new(shared),
            reader: Mutex::new(None),
            queue_rx,
        }
    }

    /// Enumerate the system's serial ports
    pub fn list_ports() -> Result<Vec<PortInfo>> {
        SystemPorts::new().available_ports()
    }

    /// Enumerate ports through this source's provider
    pub fn available_ports(&self) -> Result<Vec<PortInfo>> {
        self.shared.ports.available_ports()
    }

    pub fn config(&self) -> &SourceConfig {
        &self.shared.config
    }

    /// Open the port; succeeds immediately if already open.
    ///
    /// An unset or `"auto"` port is resolved on every call, so a reconnect may
    /// land on a different device.
    pub fn connect(&self) -> Result<()> {
        self.shared.connect()
    }

    /// Stop the reader and close the port
    pub fn disconnect(&self) {
        self.stop_reading();

        let mut state = self.shared.lock_state();
        if let Some(mut link) = state.link.take() {
            if link.is_open() {
                link.close();
                info!(port = link.name(), "Disconnected from serial port");
            }
        }
    }

    /// Start the background reader, connecting first if needed.
    ///
    /// Calling this while a reader is running does nothing.
    pub fn start_reading(&self) -> Result<()> {
        let mut reader = self.reader.lock().unwrap_or_else(PoisonError::into_inner);
        if reader.as_ref().is_some_and(ReaderHandle::is_active) {
            return Ok(());
        }
        if let Some(finished) = reader.take() {
            finished.stop(STOP_TIMEOUT);
        }

        if !self.is_connected() {
            self.connect().context("Failed to connect to serial port")?;
        }

        let running = Arc::new(AtomicBool::new(true));
        let (done_tx, done_rx) = bounded(1);
        let worker = ReaderWorker::new(Arc::clone(&self.shared), Arc::clone(&running), done_tx);
        let thread = std::thread::Builder::new()
            .name("serialscope-reader".to_string())
            .spawn(move || worker.run())?;

        *reader = Some(ReaderHandle {
            running,
            done_rx,
            thread,
        });
        info!("Started serial reading thread");
        Ok(())
    }

    /// Stop the background reader, waiting at most [`STOP_TIMEOUT`]
    pub fn stop_reading(&self) {
        let handle = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.stop(STOP_TIMEOUT);
        }
    }

    /// Whether the reader thread is running
    pub fn is_reading(&self) -> bool {
        self.reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(ReaderHandle::is_active)
    }

    /// Next queued chunk, waiting up to `timeout` (default: read timeout).
    ///
    /// `None` means nothing arrived in time.
    pub fn read(&self, timeout: Option<Duration>) -> Option<Vec<u8>> {
        let timeout = timeout.unwrap_or_else(|| self.shared.config.read_timeout());
        self.queue_rx.recv_timeout(timeout).ok()
    }

    /// Next queued chunk without waiting
    pub fn try_read(&self) -> Option<Vec<u8>> {
        self.queue_rx.try_recv().ok()
    }

    /// Every chunk currently queued
    pub fn drain(&self) -> Vec<Vec<u8>> {
        self.queue_rx.try_iter().collect()
    }

    /// Write to the port; fails with `NotConnected` when no port is open
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        let mut state = self.shared.lock_state();
        let link = state
            .link
            .as_mut()
            .filter(|link| link.is_open())
            .ok_or(ScopeError::NotConnected)?;

        link.write(data).map_err(|e| {
            error!(error = %e, "Serial write error");
            e
        })
    }

    pub fn is_connected(&self) -> bool {
        self.shared
            .lock_state()
            .link
            .as_ref()
            .is_some_and(|link| link.is_open())
    }

    /// Name of the port last opened
    pub fn port_name(&self) -> Option<String> {
        self.shared.lock_state().port_name.clone()
    }

    /// Snapshot of the reader statistics
    pub fn stats(&self) -> SourceStats {
        self.shared.lock_state().stats.clone()
    }

    /// Register a callback for every chunk read.
    ///
    /// Callbacks run on the reader thread in registration order. Errors and
    /// panics are logged and counted; they never stop the reader.
    pub fn register_callback<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(&[u8]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut state = self.shared.lock_state();
        let id = CallbackId(state.next_callback_id);
        state.next_callback_id += 1;
        state.callbacks.push((id, Arc::new(callback)));
        id
    }

    /// Remove a callback; returns whether it was registered
    pub fn unregister_callback(&self, id: CallbackId) -> bool {
        let mut state = self.shared.lock_state();
        let before = state.callbacks.len();
        state.callbacks.retain(|(cb_id, _)| *cb_id != id);
        state.callbacks.len() < before
    }
}

impl Drop for SerialSource {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for SerialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialSource")
            .field("config", &self.shared.config)
            .field("connected", &self.is_connected())
            .field("reading", &self.is_reading())
            .finish()
    }
}
