//! Shared fixtures for flakegen integration tests.
//!
//! Provides:
//! - Temporary state-file directories
//! - Helpers for decoding and ordering ids

#![allow(dead_code)]

use std::path::PathBuf;
use std::time::{Duration, Instant};
use tempfile::TempDir;

use flakegen::layout::DEFAULT_EPOCH_MS;
use flakegen::observability::tracing::init_test_tracing;
use flakegen::Layout;

/// Milliseconds after the default epoch, as absolute Unix milliseconds.
pub fn at(delta_millis: i64) -> i64 {
    DEFAULT_EPOCH_MS + delta_millis
}

/// Test fixture that manages a temporary state directory.
///
/// The directory is automatically cleaned up when the fixture is dropped.
pub struct TestFixture {
    /// Temporary directory for the state file
    pub temp_dir: TempDir,
    /// Path to the state file (not created)
    pub state_path: PathBuf,
}

impl TestFixture {
    /// Create a new test fixture with a temporary state directory.
    pub fn new() -> Self {
        init_test_tracing();
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let state_path = temp_dir.path().join("last_time");
        Self {
            temp_dir,
            state_path,
        }
    }

    /// Get the state path as a string.
    pub fn state_path_str(&self) -> &str {
        self.state_path.to_str().expect("invalid path")
    }

    /// Read the persisted timestamp, if any.
    pub fn saved_timestamp(&self) -> Option<i64> {
        std::fs::read_to_string(&self.state_path)
            .ok()
            .map(|contents| contents.trim().parse().expect("state file not an integer"))
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Assert that ids decode to strictly increasing `(timestamp, sequence)` pairs.
pub fn assert_strictly_increasing(ids: &[i64]) {
    let layout = Layout::default();
    for pair in ids.windows(2) {
        let (a, b) = (layout.decode(pair[0]), layout.decode(pair[1]));
        assert!(
            (a.timestamp_delta, a.sequence) < (b.timestamp_delta, b.sequence),
            "ids not increasing: {a:?} then {b:?}"
        );
        assert!(pair[0] < pair[1]);
    }
}

/// Wait for a condition to become true with timeout.
///
/// Returns `true` if the condition was met, `false` if the timeout expired.
pub fn wait_for<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_creates_temp_dir() {
        let fixture = TestFixture::new();
        assert!(fixture.temp_dir.path().exists());
        assert!(fixture.state_path_str().ends_with("last_time"));
        assert!(fixture.saved_timestamp().is_none());
    }
}
