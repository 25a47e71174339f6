//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level snapshot store.
///
/// Backends are **opaque byte stores** holding exactly one snapshot. The
/// database owns the snapshot encoding; a backend only loads and replaces it.
///
/// # Invariants
///
/// - `load` returns exactly the bytes passed to the last successful `replace`
/// - `replace` is all-or-nothing: after a failure, `load` still returns the
///   previous snapshot
/// - `sync` makes the last replaced snapshot survive process termination
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait StorageBackend: Send + Sync {
    /// Loads the current snapshot.
    ///
    /// Returns `None` when nothing has been stored yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be read.
    fn load(&self) -> StorageResult<Option<Vec<u8>>>;

    /// Replaces the stored snapshot with `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails. The previous snapshot is left
    /// in place in that case.
    fn replace(&mut self, data: &[u8]) -> StorageResult<()>;

    /// Returns the size of the stored snapshot in bytes (0 if empty).
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Syncs the snapshot and its metadata to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&mut self) -> StorageResult<()>;
}
