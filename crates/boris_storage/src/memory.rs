//! In-memory storage backend for testing.

use crate::backend::StorageBackend;
use crate::error::StorageResult;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// An in-memory storage backend.
///
/// This backend keeps the snapshot in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral databases that don't need persistence
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use boris_storage::{StorageBackend, InMemoryBackend};
///
/// let mut backend = InMemoryBackend::new();
/// backend.replace(b"snapshot").unwrap();
/// assert_eq!(backend.size().unwrap(), 8);
/// assert_eq!(backend.replace_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: RwLock<Option<Vec<u8>>>,
    replaces: AtomicU64,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory backend with a pre-existing snapshot.
    ///
    /// Useful for testing schema upgrades of older snapshots.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(Some(data)),
            replaces: AtomicU64::new(0),
        }
    }

    /// Returns a copy of the stored snapshot.
    #[must_use]
    pub fn data(&self) -> Option<Vec<u8>> {
        self.data.read().clone()
    }

    /// Returns how many times the snapshot has been replaced.
    #[must_use]
    pub fn replace_count(&self) -> u64 {
        self.replaces.load(Ordering::Relaxed)
    }

    /// Drops the stored snapshot.
    pub fn clear(&mut self) {
        *self.data.write() = None;
    }
}

impl StorageBackend for InMemoryBackend {
    fn load(&self) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.data.read().clone())
    }

    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        *self.data.write() = Some(data.to_vec());
        self.replaces.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().as_ref().map_or(0, |d| d.len() as u64))
    }

    fn sync(&mut self) -> StorageResult<()> {
        // Nothing to make durable
        Ok(())
    }
}
