//! Error types for the BORIS data core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] boris_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The storage engine cannot be opened.
    ///
    /// Fatal for the application; surfaced once at startup.
    #[error("storage unavailable: {reason}")]
    StorageUnavailable {
        /// Why the engine could not be opened.
        reason: String,
    },

    /// A record targeted by an operation does not exist.
    #[error("record not found: {key} in {store}")]
    RecordNotFound {
        /// The collection searched.
        store: String,
        /// The record key that was not found.
        key: String,
    },

    /// Collection not found.
    #[error("collection not found: {name}")]
    CollectionNotFound {
        /// Name of the collection.
        name: String,
    },

    /// Index not found on a collection.
    #[error("index not found: {index} on {store}")]
    IndexNotFound {
        /// The collection.
        store: String,
        /// The index name.
        index: String,
    },

    /// Input rejected before it reached storage.
    #[error("validation failed: {message}")]
    Validation {
        /// What was wrong with the input.
        message: String,
    },

    /// A bundle failed validation; nothing was written.
    #[error("invalid backup bundle: {}", errors.join("; "))]
    InvalidBundle {
        /// The validation errors, in the order they were found.
        errors: Vec<String>,
    },

    /// A bundle file is not well-formed JSON.
    #[error("malformed backup file: {reason}")]
    MalformedFile {
        /// Parser message.
        reason: String,
    },

    /// A file is not a backup bundle.
    #[error("not a backup file: {path}")]
    WrongFileType {
        /// The offending path.
        path: String,
    },

    /// Waiting for in-flight writes to drain took too long.
    #[error("write guard timed out after {waited_ms} ms with {active_writes} write(s) in flight")]
    GuardTimeout {
        /// How long the caller waited.
        waited_ms: u64,
        /// Writes still in flight when giving up.
        active_writes: usize,
    },

    /// Schema definition or upgrade failed.
    #[error("migration failed: {message}")]
    MigrationFailed {
        /// Description of the failure.
        message: String,
    },
}

impl CoreError {
    /// Creates a storage unavailable error.
    pub fn storage_unavailable(reason: impl Into<String>) -> Self {
        Self::StorageUnavailable {
            reason: reason.into(),
        }
    }

    /// Creates a record not found error.
    pub fn record_not_found(store: impl Into<String>, key: impl Into<String>) -> Self {
        Self::RecordNotFound {
            store: store.into(),
            key: key.into(),
        }
    }

    /// Creates a collection not found error.
    pub fn collection_not_found(name: impl Into<String>) -> Self {
        Self::CollectionNotFound { name: name.into() }
    }

    /// Creates an index not found error.
    pub fn index_not_found(store: impl Into<String>, index: impl Into<String>) -> Self {
        Self::IndexNotFound {
            store: store.into(),
            index: index.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a malformed file error.
    pub fn malformed_file(reason: impl Into<String>) -> Self {
        Self::MalformedFile {
            reason: reason.into(),
        }
    }

    /// Creates a wrong file type error.
    pub fn wrong_file_type(path: impl Into<String>) -> Self {
        Self::WrongFileType { path: path.into() }
    }

    /// Creates a migration failed error.
    pub fn migration_failed(message: impl Into<String>) -> Self {
        Self::MigrationFailed {
            message: message.into(),
        }
    }

    /// Returns true for errors the user can fix by picking another file or
    /// correcting input.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::RecordNotFound { .. }
                | Self::Validation { .. }
                | Self::InvalidBundle { .. }
                | Self::MalformedFile { .. }
                | Self::WrongFileType { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_bundle_lists_every_error() {
        let err = CoreError::InvalidBundle {
            errors: vec!["unknown app: x".into(), "stores is missing".into()],
        };
        assert_eq!(
            err.to_string(),
            "invalid backup bundle: unknown app: x; stores is missing"
        );
    }

    #[test]
    fn recoverable_classification() {
        assert!(CoreError::wrong_file_type("a.txt").is_recoverable());
        assert!(CoreError::validation("bad").is_recoverable());
        assert!(!CoreError::storage_unavailable("locked").is_recoverable());
    }
}
