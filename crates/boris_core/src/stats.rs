//! Database statistics.
//!
//! Counters for gateway activity, used by health reporting and the CLI.
//!
//! # Usage
//!
//! ```rust,ignore
//! use boris_core::Database;
//!
//! let db = Database::open_in_memory()?;
//! // ...
//! let stats = db.stats().snapshot();
//! println!("reads: {}, batches: {}", stats.reads, stats.batches);
//! ```

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Gateway statistics.
///
/// All counters are atomic and monotonically increasing.
#[derive(Debug, Default)]
pub struct DatabaseStats {
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    scans: AtomicU64,
    index_lookups: AtomicU64,
    batches: AtomicU64,
    bytes_written: AtomicU64,
    errors: AtomicU64,
}

impl DatabaseStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_scan(&self) {
        self.scans.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_index_lookup(&self) {
        self.index_lookups.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a committed batch and the size of the snapshot it wrote.
    pub(crate) fn record_batch(&self, bytes: u64) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of point reads.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Returns the number of records written (puts).
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Returns the number of records removed.
    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    /// Returns the number of full collection scans.
    ///
    /// High scan counts may indicate a missing index.
    pub fn scans(&self) -> u64 {
        self.scans.load(Ordering::Relaxed)
    }

    /// Returns the number of index lookups.
    pub fn index_lookups(&self) -> u64 {
        self.index_lookups.load(Ordering::Relaxed)
    }

    /// Returns the number of committed batches.
    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    /// Returns the total snapshot bytes written.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Returns the number of failed operations.
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            reads: self.reads(),
            writes: self.writes(),
            deletes: self.deletes(),
            scans: self.scans(),
            index_lookups: self.index_lookups(),
            batches: self.batches(),
            bytes_written: self.bytes_written(),
            errors: self.errors(),
        }
    }
}

/// A point-in-time copy of [`DatabaseStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// Point reads.
    pub reads: u64,
    /// Records written.
    pub writes: u64,
    /// Records removed.
    pub deletes: u64,
    /// Full collection scans.
    pub scans: u64,
    /// Index lookups.
    pub index_lookups: u64,
    /// Committed batches.
    pub batches: u64,
    /// Snapshot bytes written.
    pub bytes_written: u64,
    /// Failed operations.
    pub errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        let stats = DatabaseStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn record_operations() {
        let stats = DatabaseStats::new();

        stats.record_read();
        stats.record_read();
        stats.record_write();
        stats.record_delete();
        stats.record_scan();
        stats.record_index_lookup();
        stats.record_batch(120);
        stats.record_batch(80);
        stats.record_error();

        let snap = stats.snapshot();
        assert_eq!(snap.reads, 2);
        assert_eq!(snap.writes, 1);
        assert_eq!(snap.deletes, 1);
        assert_eq!(snap.scans, 1);
        assert_eq!(snap.index_lookups, 1);
        assert_eq!(snap.batches, 2);
        assert_eq!(snap.bytes_written, 200);
        assert_eq!(snap.errors, 1);
    }

    #[test]
    fn concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(DatabaseStats::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let s = Arc::clone(&stats);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    s.record_read();
                    s.record_write();
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(stats.reads(), 1000);
        assert_eq!(stats.writes(), 1000);
    }
}
