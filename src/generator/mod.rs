//! Time-ordered id generator.
//!
//! A [`Generator`] owns the mutable `(last_timestamp, sequence)` state for one
//! node and serializes every advance of it behind a single mutex, including
//! the busy-waits for a rolled-back clock or an exhausted sequence. That
//! coarse lock is what makes ids from one instance strictly increasing.
//!
//! Optional persistence records the last timestamp in a [`TimestampStore`] so
//! a restarted process waits out any clock regression relative to ids it
//! issued before the restart.

mod builder;

pub use builder::GeneratorBuilder;

use std::fmt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::clock::{Clock, SystemClock};
use crate::layout::{DecodedId, Layout};
use crate::storage::{FileStore, StorageError, TimestampStore};

/// Error type for generator construction and operation.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("node id {node_id} out of range [0, {max}]")]
    NodeOutOfRange { node_id: i64, max: i64 },

    #[error("failed to load persisted timestamp: {0}")]
    PersistenceLoad(#[source] StorageError),

    #[error("failed to save last timestamp: {0}")]
    PersistenceSave(#[source] StorageError),

    #[error("clock did not move past {last} ms within {waited:?} (now {now} ms)")]
    ClockRegression {
        last: i64,
        now: i64,
        waited: Duration,
    },

    #[error("clock reads {now} ms, before the layout epoch {epoch} ms")]
    ClockBeforeEpoch { now: i64, epoch: i64 },

    #[error("generator has no persistence store")]
    NotPersistent,
}

/// Tunables fixed at construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeneratorOptions {
    /// Bit layout and epoch
    pub layout: Layout,
    /// Longest a single call may wait for the clock to move forward.
    /// `None` waits indefinitely.
    pub max_stall: Option<Duration>,
}

/// Mutable state guarded by the generator lock.
#[derive(Debug)]
struct GuardState {
    /// Millisecond of the most recent id from this instance
    timestamp: Option<i64>,
    /// High-water mark: ids at or below this millisecond may already exist
    last_timestamp: i64,
    sequence: i64,
}

/// Issues unique, time-ordered 64-bit ids for one node.
///
/// Safe to share across threads (typically behind an `Arc`).
pub struct Generator<C: Clock = SystemClock> {
    node_id: i64,
    layout: Layout,
    max_stall: Option<Duration>,
    clock: C,
    state: Mutex<GuardState>,
    store: Option<Box<dyn TimestampStore>>,
}

impl Generator<SystemClock> {
    /// Create a non-persistent generator with the default layout.
    pub fn new(node_id: i64) -> Result<Self, GeneratorError> {
        Self::builder(node_id).build()
    }

    /// Create a generator that persists its last timestamp at `path`.
    ///
    /// A missing file is treated as a first run.
    pub fn with_storage<P: AsRef<Path>>(node_id: i64, path: P) -> Result<Self, GeneratorError> {
        Self::builder(node_id).store(FileStore::new(path)).build()
    }

    /// Start configuring a generator for `node_id`.
    pub fn builder(node_id: i64) -> GeneratorBuilder<SystemClock> {
        GeneratorBuilder::new(node_id)
    }
}

impl<C: Clock> Generator<C> {
    pub(crate) fn from_parts(
        node_id: i64,
        options: GeneratorOptions,
        clock: C,
        store: Option<Box<dyn TimestampStore>>,
    ) -> Result<Self, GeneratorError> {
        let layout = options.layout;
        if node_id < 0 || node_id > layout.node_max() {
            return Err(GeneratorError::NodeOutOfRange {
                node_id,
                max: layout.node_max(),
            });
        }

        let now = clock.now_millis();
        if now < layout.epoch_ms() {
            return Err(GeneratorError::ClockBeforeEpoch {
                now,
                epoch: layout.epoch_ms(),
            });
        }

        let last_timestamp = match &store {
            None => 0,
            Some(store) => match store.load().map_err(GeneratorError::PersistenceLoad)? {
                Some(saved) => {
                    tracing::debug!(node_id, saved, now, "Loaded persisted timestamp");
                    saved
                }
                None => now,
            },
        };

        tracing::info!(
            node_id,
            persistent = store.is_some(),
            last_timestamp,
            "Generator initialized"
        );

        Ok(Self {
            node_id,
            layout,
            max_stall: options.max_stall,
            clock,
            state: Mutex::new(GuardState {
                timestamp: None,
                last_timestamp,
                sequence: 0,
            }),
            store,
        })
    }

    /// Issue the next id.
    ///
    /// Blocks (busy-polling the clock) while the clock is behind the last
    /// issued timestamp or the current millisecond's sequence is used up.
    /// Fails only when `max_stall` is set and that wait exceeds it.
    pub fn next_id(&self) -> Result<i64, GeneratorError> {
        let mut state = self.lock_state();
        let mut now = self.clock.now_millis();

        // A restored high-water mark may hide ids from a previous process in
        // the same millisecond, so equality also has to wait.
        if now < state.last_timestamp
            || (now == state.last_timestamp && state.timestamp != Some(now))
        {
            if now < state.last_timestamp {
                tracing::warn!(
                    node_id = self.node_id,
                    last = state.last_timestamp,
                    now,
                    "Clock moved backwards, waiting to catch up"
                );
            }
            now = self.wait_past(state.last_timestamp)?;
        }

        // Only reachable while the high-water mark is itself below the epoch
        if now < self.layout.epoch_ms() {
            tracing::warn!(node_id = self.node_id, now, "Clock is before the layout epoch");
            return Err(GeneratorError::ClockBeforeEpoch {
                now,
                epoch: self.layout.epoch_ms(),
            });
        }

        let sequence = if state.timestamp == Some(now) {
            let next = state.sequence + 1;
            if next > self.layout.step_max() {
                tracing::debug!(node_id = self.node_id, now, "Sequence exhausted");
                now = self.wait_past(now)?;
                0
            } else {
                next
            }
        } else {
            0
        };

        state.timestamp = Some(now);
        state.last_timestamp = now;
        state.sequence = sequence;
        drop(state);

        Ok(self
            .layout
            .encode(now - self.layout.epoch_ms(), self.node_id, sequence))
    }

    /// Issue `count` ids in order, exactly as `count` calls to
    /// [`next_id`](Self::next_id) would.
    ///
    /// On error the ids issued so far are discarded.
    pub fn next_batch(&self, count: usize) -> Result<Vec<i64>, GeneratorError> {
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            ids.push(self.next_id()?);
        }
        Ok(ids)
    }

    /// Write the last issued timestamp to the persistence store.
    ///
    /// Idempotent and safe to call at any time, from any thread.
    pub fn save_last_time(&self) -> Result<(), GeneratorError> {
        let store = self.store.as_ref().ok_or(GeneratorError::NotPersistent)?;
        let state = self.lock_state();

        store
            .save(state.last_timestamp)
            .map_err(GeneratorError::PersistenceSave)?;

        tracing::info!(
            node_id = self.node_id,
            last_timestamp = state.last_timestamp,
            "Persisted last timestamp"
        );
        Ok(())
    }

    /// Save without reporting failure, for shutdown paths.
    ///
    /// Returns whether a value was written. Non-persistent generators
    /// return `false`.
    pub fn flush_best_effort(&self) -> bool {
        if self.store.is_none() {
            return false;
        }

        match self.save_last_time() {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(node_id = self.node_id, error = %err, "Best-effort save failed");
                false
            }
        }
    }

    /// Like [`flush_best_effort`](Self::flush_best_effort), but gives up
    /// instead of blocking when the state lock is held.
    ///
    /// Meant for fault paths such as panic hooks, where the panicking thread
    /// may itself be holding the lock.
    pub fn try_flush(&self) -> bool {
        let Some(store) = self.store.as_ref() else {
            return false;
        };

        let state = match self.state.try_lock() {
            Ok(state) => state,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                tracing::warn!(node_id = self.node_id, "State lock busy, skipping flush");
                return false;
            }
        };

        match store.save(state.last_timestamp) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(node_id = self.node_id, error = %err, "Fault-path save failed");
                false
            }
        }
    }

    /// Decode an id with this generator's layout.
    pub fn decode(&self, id: i64) -> DecodedId {
        self.layout.decode(id)
    }

    pub fn node_id(&self) -> i64 {
        self.node_id
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn max_stall(&self) -> Option<Duration> {
        self.max_stall
    }

    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    /// Milliseconds since the Unix epoch of the most recent id, or the
    /// restored/seeded value if none has been issued yet.
    pub fn last_timestamp(&self) -> i64 {
        self.lock_state().last_timestamp
    }

    /// Busy-poll the clock until it reads strictly after `target`.
    fn wait_past(&self, target: i64) -> Result<i64, GeneratorError> {
        let started = Instant::now();
        loop {
            let now = self.clock.now_millis();
            if now > target {
                return Ok(now);
            }

            if let Some(max_stall) = self.max_stall {
                let waited = started.elapsed();
                if waited >= max_stall {
                    tracing::error!(
                        node_id = self.node_id,
                        last = target,
                        now,
                        ?waited,
                        "Clock stalled past the allowed wait"
                    );
                    return Err(GeneratorError::ClockRegression {
                        last: target,
                        now,
                        waited,
                    });
                }
            }

            std::hint::spin_loop();
        }
    }

    // State stays consistent across a panic: fields are only written after
    // every fallible step has succeeded.
    fn lock_state(&self) -> MutexGuard<'_, GuardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Clock> fmt::Debug for Generator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("node_id", &self.node_id)
            .field("layout", &self.layout)
            .field("max_stall", &self.max_stall)
            .field("persistent", &self.store.is_some())
            .finish_non_exhaustive()
    }
}
