//! In-memory store.

use std::sync::{Arc, Mutex, PoisonError};

use super::{StorageError, TimestampStore};

/// Keeps the last timestamp in memory.
///
/// Clones share the stored value, which lets a test hand one clone to a
/// generator and inspect or reuse another after the generator is gone.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    value: Arc<Mutex<Option<i64>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `last_millis`.
    pub fn with_value(last_millis: i64) -> Self {
        Self {
            value: Arc::new(Mutex::new(Some(last_millis))),
        }
    }

    /// The currently stored timestamp.
    pub fn value(&self) -> Option<i64> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TimestampStore for MemoryStore {
    fn load(&self) -> Result<Option<i64>, StorageError> {
        Ok(self.value())
    }

    fn save(&self, last_millis: i64) -> Result<(), StorageError> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(last_millis);
        Ok(())
    }
}
