//! Builder for [`Generator`].

use std::path::Path;
use std::time::Duration;

use super::{Generator, GeneratorError, GeneratorOptions};
use crate::clock::{Clock, SystemClock};
use crate::layout::Layout;
use crate::storage::{FileStore, TimestampStore};

/// Configures and constructs a [`Generator`].
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use flakegen::{Generator, Layout, ManualClock};
///
/// let clock = ManualClock::new(1_672_531_200_123);
/// let generator = Generator::builder(1)
///     .layout(Layout::default())
///     .max_stall(Duration::from_millis(50))
///     .clock(clock)
///     .build()
///     .unwrap();
///
/// let decoded = generator.decode(generator.next_id().unwrap());
/// assert_eq!(decoded.timestamp_delta, 123);
/// ```
pub struct GeneratorBuilder<C: Clock = SystemClock> {
    node_id: i64,
    options: GeneratorOptions,
    clock: C,
    store: Option<Box<dyn TimestampStore>>,
}

impl GeneratorBuilder<SystemClock> {
    pub fn new(node_id: i64) -> Self {
        Self {
            node_id,
            options: GeneratorOptions::default(),
            clock: SystemClock,
            store: None,
        }
    }
}

impl<C: Clock> GeneratorBuilder<C> {
    /// Replace all options at once.
    pub fn options(mut self, options: GeneratorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn layout(mut self, layout: Layout) -> Self {
        self.options.layout = layout;
        self
    }

    /// Bound how long one call may wait for the clock.
    pub fn max_stall(mut self, max_stall: Duration) -> Self {
        self.options.max_stall = Some(max_stall);
        self
    }

    /// Use a different clock source.
    pub fn clock<D: Clock>(self, clock: D) -> GeneratorBuilder<D> {
        GeneratorBuilder {
            node_id: self.node_id,
            options: self.options,
            clock,
            store: self.store,
        }
    }

    /// Persist the last timestamp in `store`.
    pub fn store<S: TimestampStore + 'static>(mut self, store: S) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    /// Persist the last timestamp in a plain-text file at `path`.
    pub fn state_file<P: AsRef<Path>>(self, path: P) -> Self {
        self.store(FileStore::new(path))
    }

    /// Validate the node id, load persisted state and build the generator.
    pub fn build(self) -> Result<Generator<C>, GeneratorError> {
        Generator::from_parts(self.node_id, self.options, self.clock, self.store)
    }
}
