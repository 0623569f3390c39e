//! Stage abstraction for the event pipeline.
//!
//! Two-layer design:
//! - **`Stage` trait** for user-defined stages (decoders, detectors).
//! - **`BuiltinStage` enum** for the stages shipped with the crate, dispatched
//!   with a `match` instead of a vtable.
//!
//! `AnyStage` wraps either variant so the pipeline handles both uniformly.

use crate::pipeline::filters::{DuplicateFilter, LevelFilter, SearchFilter};
use crate::types::Event;

/// What a stage decided for one event
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    /// Pass the event on unchanged
    Keep,
    /// Pass this event on instead
    Replace(Event),
    /// Discard the event; later stages never see it
    Drop,
}

impl StageOutcome {
    pub fn is_drop(&self) -> bool {
        matches!(self, StageOutcome::Drop)
    }
}

impl From<Option<Event>> for StageOutcome {
    /// `None` drops, `Some` replaces
    fn from(event: Option<Event>) -> Self {
        match event {
            Some(event) => StageOutcome::Replace(event),
            None => StageOutcome::Drop,
        }
    }
}

/// Trait for user-defined stages.
///
/// Errors returned from `process` (and panics) are logged by the pipeline and
/// the event continues unchanged to the next stage.
pub trait Stage: Send {
    /// Unique name within a pipeline
    fn name(&self) -> &str;

    /// Inspect one event
    fn process(&mut self, event: &Event) -> anyhow::Result<StageOutcome>;

    /// Called when the stage is registered
    fn on_start(&mut self) {}

    /// Called when the stage is unregistered or replaced
    fn on_stop(&mut self) {}
}

/// Enum dispatch for built-in stages
#[derive(Debug)]
pub enum BuiltinStage {
    Level(LevelFilter),
    Search(SearchFilter),
    Duplicate(DuplicateFilter),
}

impl BuiltinStage {
    pub fn name(&self) -> &str {
        match self {
            BuiltinStage::Level(s) => s.name(),
            BuiltinStage::Search(s) => s.name(),
            BuiltinStage::Duplicate(s) => s.name(),
        }
    }

    pub fn process(&mut self, event: &Event) -> StageOutcome {
        match self {
            BuiltinStage::Level(s) => s.process(event),
            BuiltinStage::Search(s) => s.process(event),
            BuiltinStage::Duplicate(s) => s.process(event),
        }
    }

    pub fn on_start(&mut self) {
        if let BuiltinStage::Duplicate(s) = self {
            s.reset();
        }
    }

    pub fn on_stop(&mut self) {}
}

/// Wrapper that holds either a built-in stage or a plugin
pub enum AnyStage {
    Builtin(BuiltinStage),
    Plugin(Box<dyn Stage>),
}

impl AnyStage {
    /// Box a user-defined stage
    pub fn plugin(stage: impl Stage + 'static) -> Self {
        AnyStage::Plugin(Box::new(stage))
    }

    pub fn name(&self) -> &str {
        match self {
            AnyStage::Builtin(s) => s.name(),
            AnyStage::Plugin(s) => s.name(),
        }
    }

    pub fn process(&mut self, event: &Event) -> anyhow::Result<StageOutcome> {
        match self {
            AnyStage::Builtin(s) => Ok(s.process(event)),
            AnyStage::Plugin(s) => s.process(event),
        }
    }

    pub fn on_start(&mut self) {
        match self {
            AnyStage::Builtin(s) => s.on_start(),
            AnyStage::Plugin(s) => s.on_start(),
        }
    }

    pub fn on_stop(&mut self) {
        match self {
            AnyStage::Builtin(s) => s.on_stop(),
            AnyStage::Plugin(s) => s.on_stop(),
        }
    }
}

impl std::fmt::Debug for AnyStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnyStage::Builtin(s) => f.debug_tuple("Builtin").field(s).finish(),
            AnyStage::Plugin(s) => f.debug_tuple("Plugin").field(&s.name()).finish(),
        }
    }
}

impl From<BuiltinStage> for AnyStage {
    fn from(stage: BuiltinStage) -> Self {
        AnyStage::Builtin(stage)
    }
}

impl From<LevelFilter> for AnyStage {
    fn from(stage: LevelFilter) -> Self {
        AnyStage::Builtin(BuiltinStage::Level(stage))
    }
}

impl From<SearchFilter> for AnyStage {
    fn from(stage: SearchFilter) -> Self {
        AnyStage::Builtin(BuiltinStage::Search(stage))
    }
}

impl From<DuplicateFilter> for AnyStage {
    fn from(stage: DuplicateFilter) -> Self {
        AnyStage::Builtin(BuiltinStage::Duplicate(stage))
    }
}

impl From<Box<dyn Stage>> for AnyStage {
    fn from(stage: Box<dyn Stage>) -> Self {
        AnyStage::Plugin(stage)
    }
}
