//! Segment registry: name → factory mapping driving configuration.

use std::collections::HashMap;

use flowline_config::SegmentConfig;

use crate::error::{PipelineError, Result};
use crate::segment::Segment;

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;

/// Factory trait for creating segments from configuration.
pub trait SegmentFactory: Send + Sync {
    /// Create a segment instance.
    ///
    /// `args` are the free command line arguments backing `$N`
    /// expansion of option values.
    ///
    /// # Errors
    /// Returns a construction error when a required option is missing
    /// or an enum-like option holds an unknown value. Optional numeric
    /// and boolean options that fail to parse warn and fall back to
    /// their documented defaults instead.
    fn create(&self, config: &SegmentConfig, args: &[String]) -> Result<Box<dyn Segment>>;

    /// The name this factory is registered under.
    fn name(&self) -> &'static str;

    /// Whether segments from this factory reject flows through the drop
    /// side-band. Decides if the builder wires a drop sender.
    fn is_filter(&self) -> bool {
        false
    }
}

/// Registry of segment factories.
///
/// Populated once at startup (`flowline-segments` registers every
/// built-in) and read-only afterwards.
pub struct SegmentRegistry {
    factories: HashMap<String, Box<dyn SegmentFactory>>,
}

impl SegmentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a segment factory.
    ///
    /// # Panics
    /// Panics on a conflicting name; two segments claiming the same
    /// name is a programming error caught at startup.
    pub fn register<F: SegmentFactory + 'static>(&mut self, factory: F) {
        let name = factory.name();
        if self.factories.contains_key(name) {
            panic!("segment registry: conflicting segment name '{name}'");
        }
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    /// Look up a factory by name.
    pub fn lookup(&self, name: &str) -> Result<&dyn SegmentFactory> {
        self.factories
            .get(name)
            .map(|f| f.as_ref())
            .ok_or_else(|| PipelineError::UnknownSegment {
                name: name.to_string(),
                available: {
                    let mut names = self.available();
                    names.sort_unstable();
                    names.join(", ")
                },
            })
    }

    /// Create a segment from its registered name and configuration.
    pub fn create(
        &self,
        name: &str,
        config: &SegmentConfig,
        args: &[String],
    ) -> Result<Box<dyn Segment>> {
        self.lookup(name)?.create(config, args)
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Names of all registered segments.
    pub fn available(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Number of registered factories.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether nothing is registered yet.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Default for SegmentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
