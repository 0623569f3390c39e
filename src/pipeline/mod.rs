//! Event pipeline
//!
//! An ordered list of named stages and anonymous handlers. Every event runs
//! through the enabled entries in registration order:
//!
//! - [`StageOutcome::Keep`] passes the current event on,
//! - [`StageOutcome::Replace`] passes a new event on,
//! - [`StageOutcome::Drop`] discards the event and skips the rest.
//!
//! A stage that errors or panics is logged and skipped; the event that entered
//! it continues unchanged.

pub mod filters;
pub mod registry;
pub mod stage;

pub use filters::{DuplicateFilter, LevelFilter, SearchFilter};
pub use registry::{StageFactory, StageRegistry};
pub use stage::{AnyStage, BuiltinStage, Stage, StageOutcome};

use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, error, info, warn};

use crate::config::FilterConfig;
use crate::error::Result;
use crate::types::Event;

/// Anonymous stateless stage
pub type Handler = Box<dyn FnMut(&Event) -> anyhow::Result<StageOutcome> + Send>;

/// Counters kept across `process` calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Events that entered the pipeline
    pub processed: u64,
    /// Events a stage dropped
    pub dropped: u64,
    /// Stage errors and panics
    pub stage_failures: u64,
}

enum EntryKind {
    Stage(AnyStage),
    Handler { id: usize, handler: Handler },
}

struct Entry {
    kind: EntryKind,
    enabled: bool,
}

impl Entry {
    fn name(&self) -> Option<&str> {
        match &self.kind {
            EntryKind::Stage(stage) => Some(stage.name()),
            EntryKind::Handler { .. } => None,
        }
    }

    fn label(&self) -> String {
        match &self.kind {
            EntryKind::Stage(stage) => stage.name().to_string(),
            EntryKind::Handler { id, .. } => format!("handler#{}", id),
        }
    }

    fn run(&mut self, event: &Event) -> anyhow::Result<StageOutcome> {
        match &mut self.kind {
            EntryKind::Stage(stage) => stage.process(event),
            EntryKind::Handler { handler, .. } => handler(event),
        }
    }
}

/// Ordered, pluggable event transforms
#[derive(Default)]
pub struct EventPipeline {
    entries: Vec<Entry>,
    next_handler: usize,
    stats: PipelineStats,
}

impl EventPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from registry names, in the given order
    pub fn from_registry<S: AsRef<str>>(registry: &StageRegistry, names: &[S]) -> Result<Self> {
        let mut pipeline = Self::new();
        for name in names {
            pipeline.register(registry.create(name.as_ref())?);
        }
        Ok(pipeline)
    }

    /// Build from the filter section: level filter, then search, then named stages
    pub fn from_filter_config(config: &FilterConfig, registry: &StageRegistry) -> Result<Self> {
        let mut pipeline = Self::new();
        if !config.levels.is_empty() {
            pipeline.register(LevelFilter::from_names(&config.levels)?);
        }
        if let Some(pattern) = config.search.as_deref().filter(|p| !p.is_empty()) {
            pipeline.register(SearchFilter::new(pattern)?);
        }
        for name in &config.stages {
            pipeline.register(registry.create(name)?);
        }
        Ok(pipeline)
    }

    /// Add a stage and call its `on_start` hook.
    ///
    /// A stage with the same name is replaced in place (its `on_stop` runs).
    pub fn register(&mut self, stage: impl Into<AnyStage>) {
        let mut stage = stage.into();
        stage.on_start();

        let name = stage.name().to_string();
        if let Some(entry) = self.entries.iter_mut().find(|e| e.name() == Some(name.as_str())) {
            warn!(stage = %name, "Stage already registered, overwriting");
            if let EntryKind::Stage(old) = &mut entry.kind {
                old.on_stop();
            }
            entry.kind = EntryKind::Stage(stage);
            entry.enabled = true;
            return;
        }

        info!(stage = %name, "Registered stage");
        self.entries.push(Entry {
            kind: EntryKind::Stage(stage),
            enabled: true,
        });
    }

    /// Box and register a user-defined stage
    pub fn register_plugin(&mut self, stage: impl Stage + 'static) {
        self.register(AnyStage::plugin(stage));
    }

    /// Append an anonymous handler
    pub fn add_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&Event) -> anyhow::Result<StageOutcome> + Send + 'static,
    {
        let id = self.next_handler;
        self.next_handler += 1;
        self.entries.push(Entry {
            kind: EntryKind::Handler {
                id,
                handler: Box::new(handler),
            },
            enabled: true,
        });
    }

    /// Remove a stage and call its `on_stop` hook; `false` if unknown
    pub fn unregister(&mut self, name: &str) -> bool {
        let Some(index) = self.entries.iter().position(|e| e.name() == Some(name)) else {
            return false;
        };
        if let EntryKind::Stage(mut stage) = self.entries.remove(index).kind {
            stage.on_stop();
        }
        info!(stage = name, "Unregistered stage");
        true
    }

    /// Enable or disable a stage without removing it; `false` if unknown
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.entries.iter_mut().find(|e| e.name() == Some(name)) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn is_enabled(&self, name: &str) -> Option<bool> {
        self.entries
            .iter()
            .find(|e| e.name() == Some(name))
            .map(|e| e.enabled)
    }

    /// Stage names in order (handlers are unnamed and skipped)
    pub fn stage_names(&self) -> Vec<&str> {
        self.entries.iter().filter_map(Entry::name).collect()
    }

    /// Stages plus handlers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Run one event through every enabled entry
    pub fn process(&mut self, event: Event) -> Option<Event> {
        self.stats.processed += 1;
        let mut current = event;

        for entry in self.entries.iter_mut().filter(|e| e.enabled) {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| entry.run(&current)));
            match outcome {
                Ok(Ok(StageOutcome::Keep)) => {}
                Ok(Ok(StageOutcome::Replace(event))) => current = event,
                Ok(Ok(StageOutcome::Drop)) => {
                    self.stats.dropped += 1;
                    debug!(stage = %entry.label(), "Event dropped");
                    return None;
                }
                Ok(Err(e)) => {
                    self.stats.stage_failures += 1;
                    error!(stage = %entry.label(), "Error in stage: {:#}", e);
                }
                Err(_) => {
                    self.stats.stage_failures += 1;
                    error!(stage = %entry.label(), "Stage panicked");
                }
            }
        }

        Some(current)
    }

    /// Process a batch, keeping survivors in order
    pub fn process_all(&mut self, events: impl IntoIterator<Item = Event>) -> Vec<Event> {
        events.into_iter().filter_map(|e| self.process(e)).collect()
    }

    /// Unregister everything, calling each stage's `on_stop`
    pub fn clear(&mut self) {
        for entry in self.entries.drain(..) {
            if let EntryKind::Stage(mut stage) = entry.kind {
                stage.on_stop();
            }
        }
    }
}

impl std::fmt::Debug for EventPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries: Vec<String> = self.entries.iter().map(Entry::label).collect();
        f.debug_struct("EventPipeline")
            .field("entries", &entries)
            .field("stats", &self.stats)
            .finish()
    }
}
