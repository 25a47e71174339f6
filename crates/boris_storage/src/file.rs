//! File-based storage backend for persistent storage.

use crate::backend::StorageBackend;
use crate::error::StorageResult;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Suffix appended to the full file name while a replace is in flight.
const TEMP_SUFFIX: &str = ".boris-tmp";

/// A file-based storage backend.
///
/// The snapshot lives in a single file. Replacing it uses the
/// write-then-rename pattern so a crash never leaves a half-written
/// snapshot behind:
///
/// 1. Write the new snapshot to `<file>.boris-tmp`
/// 2. Sync the temporary file to disk
/// 3. Rename it over the snapshot file
/// 4. Sync the parent directory so the rename is durable
///
/// # Example
///
/// ```no_run
/// use boris_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("boris.json")).unwrap();
/// backend.replace(b"{}").unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    temp_path: PathBuf,
}

impl FileBackend {
    /// Opens a file backend at the given path.
    ///
    /// The file is not created until the first `replace`. Nothing on disk
    /// is touched; see [`FileBackend::discard_stale_temp`].
    ///
    /// # Errors
    ///
    /// Returns an error if the path exists but is not a file.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if path.exists() && !path.is_file() {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("snapshot path is not a file: {}", path.display()),
            )
            .into());
        }

        let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
        temp_name.push(TEMP_SUFFIX);
        let temp_path = path.with_file_name(temp_name);

        Ok(Self {
            path: path.to_path_buf(),
            temp_path,
        })
    }

    /// Opens a file backend, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the path is unusable.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Removes the temporary file left by an interrupted replace.
    ///
    /// Returns true if a file was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn discard_stale_temp(&self) -> StorageResult<bool> {
        match fs::remove_file(&self.temp_path) {
            Ok(()) => {
                debug!(path = %self.temp_path.display(), "removed stale snapshot temp file");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the path to the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(unix)]
    fn sync_parent(&self) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            File::open(parent)?.sync_all()?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_parent(&self) -> StorageResult<()> {
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn load(&self) -> StorageResult<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(data) if data.is_empty() => Ok(None),
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        let mut file = File::create(&self.temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&self.temp_path, &self.path)?;
        self.sync_parent()?;

        debug!(path = %self.path.display(), bytes = data.len(), "snapshot replaced");
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.path.exists() {
            File::open(&self.path)?.sync_all()?;
        }
        self.sync_parent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_missing_loads_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("boris.json");

        let backend = FileBackend::open(&path).unwrap();
        assert!(backend.load().unwrap().is_none());
        assert_eq!(backend.size().unwrap(), 0);
        assert!(!path.exists());
    }

    #[test]
    fn file_replace_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("boris.json");

        let mut backend = FileBackend::open(&path).unwrap();
        backend.replace(b"one").unwrap();
        backend.replace(b"two two").unwrap();

        assert_eq!(backend.load().unwrap().unwrap(), b"two two");
        assert_eq!(backend.size().unwrap(), 7);
        assert!(!dir.path().join("boris.json.boris-tmp").exists());
    }

    #[test]
    fn file_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("boris.json");

        {
            let mut backend = FileBackend::open(&path).unwrap();
            backend.replace(b"persistent data").unwrap();
            backend.sync().unwrap();
        }

        {
            let backend = FileBackend::open(&path).unwrap();
            assert_eq!(backend.load().unwrap().unwrap(), b"persistent data");
        }
    }

    #[test]
    fn file_stale_temp_is_removed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("boris.json");
        let temp = dir.path().join("boris.json.boris-tmp");
        fs::write(&path, b"good").unwrap();
        fs::write(&temp, b"half-writ").unwrap();

        let backend = FileBackend::open(&path).unwrap();
        assert!(temp.exists());
        assert!(backend.discard_stale_temp().unwrap());
        assert!(!temp.exists());
        assert!(!backend.discard_stale_temp().unwrap());
        assert_eq!(backend.load().unwrap().unwrap(), b"good");
    }

    #[test]
    fn file_leaves_sibling_files_alone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.json");
        let sibling = dir.path().join("notes.tmp");
        fs::write(&sibling, b"user data").unwrap();

        let mut backend = FileBackend::open(&path).unwrap();
        backend.replace(b"{}").unwrap();
        backend.discard_stale_temp().unwrap();

        assert_eq!(fs::read(&sibling).unwrap(), b"user data");
        assert_eq!(fs::read(&path).unwrap(), b"{}");
    }

    #[test]
    fn file_empty_file_loads_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("boris.json");
        fs::write(&path, b"").unwrap();

        let backend = FileBackend::open(&path).unwrap();
        assert!(backend.load().unwrap().is_none());
    }

    #[test]
    fn file_directory_path_rejected() {
        let dir = tempdir().unwrap();
        assert!(FileBackend::open(dir.path()).is_err());
    }

    #[test]
    fn file_create_with_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("path").join("boris.json");

        let mut backend = FileBackend::open_with_create_dirs(&path).unwrap();
        backend.replace(b"x").unwrap();
        assert!(path.exists());
        assert_eq!(backend.path(), path);
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig::with_cases(16))]

        #[test]
        fn reopen_sees_last_replace(snapshots in proptest::collection::vec(
            proptest::collection::vec(proptest::prelude::any::<u8>(), 0..256),
            1..5,
        )) {
            let dir = tempdir().unwrap();
            let path = dir.path().join("boris.json");
            {
                let mut backend = FileBackend::open(&path).unwrap();
                for data in &snapshots {
                    backend.replace(data).unwrap();
                }
                backend.sync().unwrap();
            }

            let reopened = FileBackend::open(&path).unwrap();
            let last = snapshots.last().cloned().unwrap_or_default();
            proptest::prop_assert_eq!(reopened.size().unwrap(), last.len() as u64);
        }
    }
}
