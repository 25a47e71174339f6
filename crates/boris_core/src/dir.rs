//! Database directory management.
//!
//! A BORIS database on disk is a directory:
//!
//! ```text
//! <db_path>/
//! ├─ LOCK          # Advisory lock, one connection per directory
//! ├─ boris.json    # Persisted snapshot (replaced atomically)
//! └─ backups/      # Default location for exported bundles
//! ```
//!
//! The LOCK file ensures only one process writes to the database at a time.

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

const LOCK_FILE: &str = "LOCK";
const DATA_FILE: &str = "boris.json";
const BACKUPS_DIR: &str = "backups";

/// Manages the database directory layout and its advisory lock.
///
/// Only one `DatabaseDir` can exist per directory at a time; the lock is
/// released when the value is dropped.
///
/// # Example
///
/// ```rust,ignore
/// use boris_core::dir::DatabaseDir;
/// use std::path::Path;
///
/// let dir = DatabaseDir::open(Path::new("boris-data"), true)?;
/// println!("snapshot: {:?}", dir.data_path());
/// ```
#[derive(Debug)]
pub struct DatabaseDir {
    path: PathBuf,
    _lock_file: File,
}

impl DatabaseDir {
    /// Opens or creates a database directory and takes its lock.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if:
    /// - the directory doesn't exist and `create_if_missing` is false
    /// - the path is not a directory
    /// - another connection holds the lock
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::storage_unavailable(format!(
                    "database directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::storage_unavailable(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_path = path.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::storage_unavailable(format!(
                "database is locked by another connection: {}",
                path.display()
            )));
        }

        debug!(path = %path.display(), "database directory locked");

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the database directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path to the persisted snapshot.
    #[must_use]
    pub fn data_path(&self) -> PathBuf {
        self.path.join(DATA_FILE)
    }

    /// Returns the default directory for exported bundles.
    #[must_use]
    pub fn backups_dir(&self) -> PathBuf {
        self.path.join(BACKUPS_DIR)
    }

    /// Checks if no snapshot has been written yet.
    #[must_use]
    pub fn is_new_database(&self) -> bool {
        !self.data_path().exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_directory() {
        let temp = tempdir().unwrap();
        let db_path = temp.path().join("new_db");

        let dir = DatabaseDir::open(&db_path, true).unwrap();
        assert!(db_path.is_dir());
        assert!(dir.is_new_database());
    }

    #[test]
    fn open_fails_if_not_exists_and_no_create() {
        let temp = tempdir().unwrap();
        let result = DatabaseDir::open(&temp.path().join("nonexistent"), false);
        assert!(matches!(
            result,
            Err(CoreError::StorageUnavailable { .. })
        ));
    }

    #[test]
    fn lock_prevents_second_open() {
        let temp = tempdir().unwrap();
        let db_path = temp.path().join("locked_db");

        let _dir1 = DatabaseDir::open(&db_path, true).unwrap();

        let result = DatabaseDir::open(&db_path, true);
        assert!(matches!(
            result,
            Err(CoreError::StorageUnavailable { .. })
        ));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        let db_path = temp.path().join("reopen_db");

        {
            let _dir = DatabaseDir::open(&db_path, true).unwrap();
        }

        let _dir2 = DatabaseDir::open(&db_path, true).unwrap();
    }

    #[test]
    fn paths_are_correct() {
        let temp = tempdir().unwrap();
        let db_path = temp.path().join("paths_db");

        let dir = DatabaseDir::open(&db_path, true).unwrap();

        assert_eq!(dir.path(), db_path.as_path());
        assert_eq!(dir.data_path(), db_path.join("boris.json"));
        assert_eq!(dir.backups_dir(), db_path.join("backups"));
    }
}
