//! Named stage factories.
//!
//! The registry is an ordinary value owned by whoever assembles the pipeline;
//! nothing registers itself globally.

use std::collections::BTreeMap;

use tracing::warn;

use crate::error::{Result, ScopeError};
use crate::pipeline::filters::{DuplicateFilter, LevelFilter};
use crate::pipeline::stage::AnyStage;
use crate::types::LogLevel;

/// Builds a fresh stage instance
pub type StageFactory = Box<dyn Fn() -> AnyStage + Send + Sync>;

/// Name → factory map
#[derive(Default)]
pub struct StageRegistry {
    factories: BTreeMap<String, StageFactory>,
}

impl StageRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `dedup` and `drop-debug`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("dedup", || DuplicateFilter::new().into());
        registry.register("drop-debug", || {
            LevelFilter::block([LogLevel::Debug])
                .named("drop-debug")
                .into()
        });
        registry
    }

    /// Add a factory; an existing entry with the same name is replaced
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> AnyStage + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            warn!(stage = %name, "Stage factory already registered, overwriting");
        }
        self.factories.insert(name, Box::new(factory));
    }

    /// Instantiate the stage registered under `name`
    pub fn create(&self, name: &str) -> Result<AnyStage> {
        let factory = self.factories.get(name).ok_or_else(|| {
            ScopeError::Config(format!(
                "Unknown stage '{}' (available: {})",
                name,
                self.names().join(", ")
            ))
        })?;
        Ok(factory())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRegistry")
            .field("names", &self.names())
            .finish()
    }
}
