//! Change feed for observing committed writes.
//!
//! Every committed [`WriteBatch`](crate::WriteBatch) produces one
//! [`ChangeEvent`] per affected record (or per cleared collection). Events
//! carry the batch's sequence number, so all events of one batch share it.
//!
//! Consumers implement [`EventSink`] and register it on the database, or use
//! the built-in [`ChangeFeed`] which fans events out to channel subscribers
//! and keeps a bounded history for cursor polling.
//!
//! # Usage
//!
//! ```rust,ignore
//! use boris_core::Database;
//!
//! let db = Database::open_in_memory()?;
//! let receiver = db.subscribe();
//!
//! std::thread::spawn(move || {
//!     while let Ok(event) = receiver.recv() {
//!         println!("{} {:?} {:?}", event.store, event.change, event.key);
//!     }
//! });
//! ```

use parking_lot::RwLock;
use std::sync::mpsc::{self, Receiver, Sender};

/// Type of change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    /// Record was inserted (no previous version existed).
    Insert,
    /// Record was replaced.
    Update,
    /// Record was removed.
    Delete,
    /// Every record of the collection was removed.
    Clear,
}

/// A single committed change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Sequence number of the commit.
    pub sequence: u64,
    /// Collection name.
    pub store: String,
    /// Record key. `None` for [`ChangeType::Clear`].
    pub key: Option<String>,
    /// Type of change.
    pub change: ChangeType,
}

impl ChangeEvent {
    /// Creates an insert event.
    pub fn insert(sequence: u64, store: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            sequence,
            store: store.into(),
            key: Some(key.into()),
            change: ChangeType::Insert,
        }
    }

    /// Creates an update event.
    pub fn update(sequence: u64, store: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            sequence,
            store: store.into(),
            key: Some(key.into()),
            change: ChangeType::Update,
        }
    }

    /// Creates a delete event.
    pub fn delete(sequence: u64, store: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            sequence,
            store: store.into(),
            key: Some(key.into()),
            change: ChangeType::Delete,
        }
    }

    /// Creates a clear event.
    pub fn clear(sequence: u64, store: impl Into<String>) -> Self {
        Self {
            sequence,
            store: store.into(),
            key: None,
            change: ChangeType::Clear,
        }
    }
}

/// Receives committed change events.
///
/// Called after the snapshot is persisted, outside the gateway lock, in
/// commit order.
pub trait EventSink: Send + Sync {
    /// Handles one event.
    fn emit(&self, event: ChangeEvent);

    /// Handles all events of one commit.
    fn emit_batch(&self, events: Vec<ChangeEvent>) {
        for event in events {
            self.emit(event);
        }
    }
}

/// A change feed that distributes committed changes to subscribers.
///
/// The change feed:
/// - Emits only committed changes
/// - Preserves commit order
/// - Supports multiple subscribers
pub struct ChangeFeed {
    subscribers: RwLock<Vec<Sender<ChangeEvent>>>,
    history: RwLock<Vec<ChangeEvent>>,
    max_history: usize,
}

impl ChangeFeed {
    /// Creates a new change feed.
    pub fn new() -> Self {
        Self::with_max_history(10_000)
    }

    /// Creates a change feed with a specific history limit.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            history: RwLock::new(Vec::new()),
            max_history,
        }
    }

    /// Subscribes to the change feed.
    ///
    /// The receiver gets every event emitted after this call and should be
    /// drained regularly.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Polls events with a sequence greater than `cursor`, up to `limit`.
    pub fn poll(&self, cursor: u64, limit: usize) -> Vec<ChangeEvent> {
        let history = self.history.read();
        history
            .iter()
            .filter(|e| e.sequence > cursor)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Returns the latest sequence number in history.
    pub fn latest_sequence(&self) -> u64 {
        self.history.read().last().map(|e| e.sequence).unwrap_or(0)
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Returns the number of events in history.
    pub fn history_len(&self) -> usize {
        self.history.read().len()
    }
}

impl EventSink for ChangeFeed {
    fn emit(&self, event: ChangeEvent) {
        {
            let mut history = self.history.write();
            history.push(event.clone());
            if history.len() > self.max_history {
                let to_remove = history.len() - self.max_history;
                history.drain(0..to_remove);
            }
        }

        // Disconnected subscribers are dropped here.
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("subscribers", &self.subscriber_count())
            .field("history", &self.history_len())
            .field("max_history", &self.max_history)
            .finish()
    }
}
