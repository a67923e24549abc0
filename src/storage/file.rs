//! Plain-text file store.
//!
//! The file holds a single base-10 integer with no framing. A missing file
//! means "no prior state"; anything else that cannot be read or parsed is an
//! error, since guessing a safe starting point could reissue old ids.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{StorageError, TimestampStore};

/// Stores the last timestamp in a text file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a store backed by `path`. The file need not exist yet.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file written first and then renamed over the target, so a
    /// crash mid-write never leaves a truncated value behind.
    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl TimestampStore for FileStore {
    fn load(&self) -> Result<Option<i64>, StorageError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.io_error(err)),
        };

        contents
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| StorageError::Parse {
                path: self.path.clone(),
                contents,
            })
    }

    fn save(&self, last_millis: i64) -> Result<(), StorageError> {
        let staging = self.staging_path();
        fs::write(&staging, last_millis.to_string()).map_err(|e| self.io_error(e))?;
        fs::rename(&staging, &self.path).map_err(|e| self.io_error(e))?;

        tracing::debug!(path = %self.path.display(), last_millis, "Saved last timestamp");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().join("last_time"));

        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("last_time");
        let store = FileStore::new(&path);

        store.save(1_700_000_000_123).unwrap();
        assert_eq!(store.load().unwrap(), Some(1_700_000_000_123));

        // Plain integer, no framing
        assert_eq!(fs::read_to_string(&path).unwrap(), "1700000000123");
        assert!(!store.staging_path().exists());
    }

    #[test]
    fn test_save_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().join("last_time"));

        store.save(10).unwrap();
        store.save(20).unwrap();
        assert_eq!(store.load().unwrap(), Some(20));
    }

    #[test]
    fn test_trailing_newline_accepted() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("last_time");
        fs::write(&path, "1672531200000\n").unwrap();

        assert_eq!(FileStore::new(&path).load().unwrap(), Some(1_672_531_200_000));
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("last_time");
        fs::write(&path, "not-a-number").unwrap();

        let err = FileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, StorageError::Parse { ref contents, .. } if contents == "not-a-number"));
    }

    #[test]
    fn test_unreadable_path_is_error() {
        let temp_dir = TempDir::new().unwrap();

        // A directory exists at the path but cannot be read as a file
        let err = FileStore::new(temp_dir.path()).load().unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
    }

    #[test]
    fn test_save_into_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().join("missing").join("last_time"));

        assert!(matches!(store.save(1), Err(StorageError::Io { .. })));
    }
}
