//! # serialscope: Serial Stream Observer
//!
//! Turns the byte stream coming off a serial device into typed, filterable
//! events (log lines, numeric metrics, framed binary packets) and can record
//! those events for later replay.
//!
//! ## Architecture
//!
//! - **Source**: owns the serial connection; a background thread reads raw
//!   chunks, reconnects after failures and hands chunks over a crossbeam queue
//! - **Framer**: stateful incremental parser, bytes in, events out, with
//!   format auto-detection
//! - **Pipeline**: ordered stages and handlers that filter or replace events
//! - **Session**: line-oriented recorder and timing-preserving replayer
//!
//! ```text
//! SerialSource ──bytes──▶ StreamFramer ──Event──▶ EventPipeline ──▶ recorder / stdout
//!                                 SessionReplayer ──Event──┘
//! ```
//!
//! ## Configuration
//!
//! Settings are read from `config.toml` in the platform config directory under
//! `serialscope`:
//!
//! - **Linux**: `~/.config/serialscope/config.toml`
//! - **macOS**: `~/Library/Application Support/serialscope/config.toml`
//! - **Windows**: `%APPDATA%\serialscope\config.toml`
//!
//! ## Example
//!
//! ```no_run
//! use serialscope::{
//!     config::SourceConfig, EventPipeline, SerialSource, StageRegistry, StreamFramer,
//! };
//! use std::time::Duration;
//!
//! fn main() -> serialscope::Result<()> {
//!     let source = SerialSource::new(SourceConfig::for_port("auto"));
//!     source.start_reading()?;
//!
//!     let mut framer = StreamFramer::default();
//!     let mut pipeline = EventPipeline::from_registry(&StageRegistry::with_builtins(), &["dedup"])?;
//!
//!     while let Some(chunk) = source.read(Some(Duration::from_millis(100))) {
//!         for event in framer.feed(&chunk) {
//!             if let Some(event) = pipeline.process(event) {
//!                 println!("{:?}", event);
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod framer;
pub mod pipeline;
pub mod session;
pub mod source;
pub mod types;

// Re-export commonly used types
pub use config::ScopeConfig;
pub use error::{Result, ResultExt, ScopeError};
pub use framer::{Format, FramerMode, StreamFramer};
pub use pipeline::{EventPipeline, Stage, StageOutcome, StageRegistry};
pub use session::{SessionRecorder, SessionReplayer};
pub use source::{PortInfo, SerialSource};
pub use types::{Event, EventKind, LogLevel};
