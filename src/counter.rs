//! Counter-backed id generation.
//!
//! Unlike [`Generator`](crate::Generator), these ids carry no structure: each
//! one is the result of an atomic increment on some store, and uniqueness is
//! entirely the store's responsibility. Any store with INCR-like semantics
//! (a shared key-value server, a database sequence) can be plugged in through
//! [`CounterBackend`]; [`AtomicCounter`] is the in-process backend.

use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;

/// Error type for counter backends.
#[derive(Debug, Error)]
pub enum CounterError {
    #[error("counter backend error: {0}")]
    Backend(String),
}

/// An atomic increment-and-return operation.
pub trait CounterBackend: Send + Sync {
    /// Increment the counter and return its new value.
    fn incr(&self) -> Result<i64, CounterError>;

    /// Increment `count` times, returning the values in issue order.
    ///
    /// Backends that can pipeline requests should override this.
    fn incr_many(&self, count: usize) -> Result<Vec<i64>, CounterError> {
        (0..count).map(|_| self.incr()).collect()
    }
}

/// In-process counter.
///
/// A batch reserves its whole range with one atomic add, so batches are
/// contiguous even under contention.
#[derive(Debug, Default)]
pub struct AtomicCounter {
    value: AtomicI64,
}

impl AtomicCounter {
    /// Create a counter whose first increment returns `initial + 1`.
    pub fn new(initial: i64) -> Self {
        Self {
            value: AtomicI64::new(initial),
        }
    }

    /// The most recently returned value.
    pub fn current(&self) -> i64 {
        self.value.load(Ordering::SeqCst)
    }
}

impl CounterBackend for AtomicCounter {
    fn incr(&self) -> Result<i64, CounterError> {
        Ok(self.value.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn incr_many(&self, count: usize) -> Result<Vec<i64>, CounterError> {
        let n = i64::try_from(count)
            .map_err(|_| CounterError::Backend(format!("batch size {count} too large")))?;
        let start = self.value.fetch_add(n, Ordering::SeqCst) + 1;
        Ok((start..start + n).collect())
    }
}

/// Issues ids by delegating to a [`CounterBackend`].
#[derive(Debug)]
pub struct CounterGenerator<B: CounterBackend> {
    backend: B,
}

impl<B: CounterBackend> CounterGenerator<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Next id from the backend.
    pub fn next(&self) -> Result<i64, CounterError> {
        self.backend.incr()
    }

    /// `count` ids in the order the backend issued them.
    pub fn next_batch(&self, count: usize) -> Result<Vec<i64>, CounterError> {
        let ids = self.backend.incr_many(count)?;
        tracing::debug!(count, "Issued counter batch");
        Ok(ids)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}
