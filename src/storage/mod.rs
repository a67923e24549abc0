//! Durable storage for the generator's last-issued timestamp.
//!
//! Provides:
//! - The [`TimestampStore`] contract used by the generator
//! - A plain-text file store for process restarts
//! - An in-memory store for tests and embedding

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::path::PathBuf;
use thiserror::Error;

/// Error type for last-timestamp storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} does not hold a base-10 timestamp: {contents:?}", .path.display())]
    Parse { path: PathBuf, contents: String },
}

/// A durable record of the most recent timestamp a generator used.
///
/// Values are milliseconds since the Unix epoch, independent of any
/// generator's own epoch.
pub trait TimestampStore: Send + Sync {
    /// Read the stored timestamp.
    ///
    /// Returns `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> Result<Option<i64>, StorageError>;

    /// Overwrite the stored timestamp.
    fn save(&self, last_millis: i64) -> Result<(), StorageError>;
}
