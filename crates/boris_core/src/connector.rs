//! Process-wide connection sharing.

use crate::config::Config;
use crate::database::Database;
use crate::error::CoreResult;
use boris_storage::InMemoryBackend;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Opens a database once and hands out the same connection afterwards.
///
/// The directory lock allows one [`Database`] per directory, so feature
/// modules share a connector instead of opening their own.
///
/// ```rust
/// use boris_core::{Config, Connector};
/// use std::sync::Arc;
///
/// let connector = Connector::in_memory(Config::default());
/// let a = connector.open().unwrap();
/// let b = connector.open().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// ```
#[derive(Debug)]
pub struct Connector {
    path: Option<PathBuf>,
    config: Config,
    db: Mutex<Option<Arc<Database>>>,
}

impl Connector {
    /// Creates a connector for a database directory.
    #[must_use]
    pub fn new(path: impl AsRef<Path>, config: Config) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            config,
            db: Mutex::new(None),
        }
    }

    /// Creates a connector for a non-persistent database.
    #[must_use]
    pub fn in_memory(config: Config) -> Self {
        Self {
            path: None,
            config,
            db: Mutex::new(None),
        }
    }

    /// Returns the open connection, opening it on first use.
    ///
    /// A failed open is not cached; the next call tries again.
    pub fn open(&self) -> CoreResult<Arc<Database>> {
        let mut slot = self.db.lock();
        if let Some(db) = slot.as_ref() {
            return Ok(Arc::clone(db));
        }

        let db = match &self.path {
            Some(path) => Database::open_with_config(path, self.config.clone())?,
            None => Database::open_with_backend(
                self.config.clone(),
                Box::new(InMemoryBackend::new()),
            )?,
        };
        debug!(path = ?self.path, "connection opened");

        let db = Arc::new(db);
        *slot = Some(Arc::clone(&db));
        Ok(db)
    }

    /// Returns true if a connection is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.db.lock().is_some()
    }

    /// Closes the shared connection.
    ///
    /// Handles already given out keep working until dropped; the directory
    /// lock is released when the last one goes away.
    pub fn close(&self) -> CoreResult<()> {
        if let Some(db) = self.db.lock().take() {
            db.close()?;
        }
        Ok(())
    }
}
