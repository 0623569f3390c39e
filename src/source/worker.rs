//! Background reader thread
//!
//! The worker owns no connection state of its own: each iteration takes the
//! shared lock, checks the link, reads whatever the driver has buffered and
//! releases the lock before queueing the chunk and running callbacks.
//!
//! # Failure handling
//!
//! - Link missing or closed: reconnect after `reconnect_interval` when
//!   auto-reconnect is on, otherwise stop.
//! - Driver read failure ([`crate::error::ScopeError::is_link_failure`]): wait, drop the
//!   handle, and let the next iteration reconnect; stop when auto-reconnect is
//!   off.
//! - Anything else: log, back off briefly, continue.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Sender, TrySendError};
use tracing::{debug, error, info, warn};

use super::{ChunkCallback, Shared};
use crate::error::Result;

/// Back-off after an unexpected error
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Longest single sleep, so a stop request is noticed quickly
const SLEEP_SLICE: Duration = Duration::from_millis(20);

/// Outcome of one loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Data was handled; poll again immediately
    Continue,
    /// Nothing pending; wait the poll interval
    Idle,
    /// Leave the loop
    Stop,
}

/// The worker that runs the read loop
pub(crate) struct ReaderWorker {
    shared: Arc<Shared>,
    running: Arc<AtomicBool>,
    done_tx: Sender<()>,
    buf: Vec<u8>,
}

impl ReaderWorker {
    pub(crate) fn new(shared: Arc<Shared>, running: Arc<AtomicBool>, done_tx: Sender<()>) -> Self {
        Self {
            shared,
            running,
            done_tx,
            buf: Vec::new(),
        }
    }

    /// Run the main read loop until stopped or the link is lost for good
    pub(crate) fn run(mut self) {
        info!("Serial reader started");

        while self.running.load(Ordering::SeqCst) {
            match self.step() {
                Ok(Step::Continue) => {}
                Ok(Step::Idle) => self.sleep(self.shared.config.poll_interval()),
                Ok(Step::Stop) => break,
                Err(e) if e.is_link_failure() => {
                    error!(error = %e, "Serial read error");
                    self.shared.lock_state().stats.read_errors += 1;

                    if !self.shared.config.auto_reconnect {
                        self.drop_link();
                        break;
                    }
                    self.sleep(self.shared.config.reconnect_interval());
                    self.drop_link();
                }
                Err(e) => {
                    error!(error = %e, "Unexpected error in read loop");
                    self.sleep(ERROR_BACKOFF);
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        let _ = self.done_tx.send(());
        info!("Serial reader stopped");
    }

    /// One pass: reconnect, or read one chunk and dispatch it
    fn step(&mut self) -> Result<Step> {
        let (chunk, callbacks) = {
            let mut state = self.shared.lock_state();

            if !state.link.as_ref().is_some_and(|link| link.is_open()) {
                drop(state);
                return Ok(self.reconnect());
            }
            let Some(link) = state.link.as_mut() else {
                return Ok(Step::Idle);
            };

            let available = link.bytes_available()?;
            if available == 0 {
                return Ok(Step::Idle);
            }

            self.buf.resize(available, 0);
            let n = link.read(&mut self.buf)?;
            if n == 0 {
                return Ok(Step::Idle);
            }

            state.stats.record_chunk(n);
            let callbacks: Vec<ChunkCallback> =
                state.callbacks.iter().map(|(_, cb)| Arc::clone(cb)).collect();
            (self.buf[..n].to_vec(), callbacks)
        };

        if !self.enqueue(&chunk) {
            return Ok(Step::Stop);
        }
        self.notify(&chunk, &callbacks);
        Ok(Step::Continue)
    }

    /// Hand the chunk to the queue; `false` once the source is gone
    fn enqueue(&self, chunk: &[u8]) -> bool {
        match self.shared.queue_tx.try_send(chunk.to_vec()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.shared.lock_state().stats.dropped_chunks += 1;
                debug!(len = chunk.len(), "Queue full, dropping chunk");
                true
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("Queue receiver dropped, stopping reader");
                false
            }
        }
    }

    /// Invoke every callback in registration order; failures are contained
    fn notify(&self, chunk: &[u8], callbacks: &[ChunkCallback]) {
        let mut failures = 0;
        for callback in callbacks {
            match panic::catch_unwind(AssertUnwindSafe(|| callback(chunk))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!("Error in callback: {:#}", e);
                    failures += 1;
                }
                Err(_) => {
                    error!("Callback panicked");
                    failures += 1;
                }
            }
        }
        if failures > 0 {
            self.shared.lock_state().stats.callback_failures += failures;
        }
    }

    fn reconnect(&self) -> Step {
        if !self.shared.config.auto_reconnect {
            info!("Serial port closed and auto-reconnect is disabled");
            return Step::Stop;
        }

        warn!("Serial port closed, attempting reconnect");
        self.sleep(self.shared.config.reconnect_interval());
        if !self.running.load(Ordering::SeqCst) {
            return Step::Stop;
        }

        self.shared.lock_state().stats.reconnect_attempts += 1;
        match self.shared.connect() {
            Ok(()) => {
                self.shared.lock_state().stats.reconnects += 1;
                info!("Reconnected");
            }
            Err(e) => warn!(error = %e, "Reconnect failed"),
        }
        Step::Continue
    }

    /// Force-close and discard the current handle
    fn drop_link(&self) {
        let mut state = self.shared.lock_state();
        if let Some(mut link) = state.link.take() {
            link.close();
            debug!(port = link.name(), "Discarded failed link");
        }
    }

    /// Sleep up to `duration`, returning early once stopped
    fn sleep(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while self.running.load(Ordering::SeqCst) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}
