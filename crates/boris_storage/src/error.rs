//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The stored snapshot is unreadable.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// The backend has been closed or is otherwise unusable.
    #[error("storage is closed")]
    Closed,
}
