//! Millisecond clock sources.
//!
//! The generator reads time only through [`Clock`], so tests can drive it
//! with a [`ManualClock`] and reproduce rollbacks and same-millisecond bursts
//! deterministically.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of wall-clock time in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since 1970-01-01T00:00:00Z.
    fn now_millis(&self) -> i64;
}

/// The host's wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_millis() as i64,
            // Host clock set before 1970
            Err(err) => -(err.duration().as_millis() as i64),
        }
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying time, so a test can hand one clone to a
/// generator and keep another to move time forward or backward.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    /// Create a clock frozen at `now_millis`.
    pub fn new(now_millis: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(now_millis)),
        }
    }

    /// Jump to an absolute time. Moving backward simulates a clock rollback.
    pub fn set(&self, now_millis: i64) {
        self.now.store(now_millis, Ordering::SeqCst);
    }

    /// Move the clock by `delta_millis` (negative values roll it back).
    ///
    /// Returns the new time.
    pub fn advance(&self, delta_millis: i64) -> i64 {
        self.now.fetch_add(delta_millis, Ordering::SeqCst) + delta_millis
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Replays a fixed list of readings, repeating the last one forever.
///
/// Each call consumes one reading, so a trace spells out exactly what every
/// clock read in a sequence of calls observes.
#[doc(hidden)]
#[derive(Debug)]
pub struct TraceClock {
    readings: Vec<i64>,
    cursor: AtomicUsize,
}

impl TraceClock {
    /// # Panics
    ///
    /// Panics if `readings` is empty.
    pub fn new(readings: Vec<i64>) -> Self {
        assert!(!readings.is_empty(), "trace needs at least one reading");
        Self {
            readings,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl Clock for TraceClock {
    fn now_millis(&self) -> i64 {
        let i = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.readings[i.min(self.readings.len() - 1)]
    }
}
