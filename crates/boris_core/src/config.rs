//! Database configuration.

use std::time::Duration;

/// Product identifier written to and expected in backup bundles.
pub const APP_ID: &str = "boris-os";

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the database directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Product identifier stamped into exported bundles.
    pub app_id: String,

    /// Age in days after which tombstones are purge-eligible.
    pub tombstone_retention_days: u32,

    /// Whether tombstones keep a full copy of the deleted record.
    ///
    /// Without the copy a soft delete cannot be undone.
    pub keep_tombstone_snapshots: bool,

    /// Whether to run the tombstone reconciliation sweep on open.
    pub reconcile_on_open: bool,

    /// How long a write-guard acquire may wait for drain before a warning is logged.
    pub drain_warning_after: Duration,

    /// How long a write-guard acquire may wait for drain before giving up
    /// (`None` = wait forever).
    pub acquire_timeout: Option<Duration>,

    /// Records sampled per collection when estimating export size.
    pub estimate_sample_size: usize,

    /// Assumed serialized record size when a collection has nothing to sample.
    pub fallback_record_bytes: u64,

    /// Whether to sync the snapshot to disk after every commit.
    pub sync_on_commit: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            app_id: APP_ID.to_string(),
            tombstone_retention_days: 30,
            keep_tombstone_snapshots: true,
            reconcile_on_open: true,
            drain_warning_after: Duration::from_secs(5),
            acquire_timeout: Some(Duration::from_secs(60)),
            estimate_sample_size: 20,
            fallback_record_bytes: 256,
            sync_on_commit: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets the product identifier.
    #[must_use]
    pub fn app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self
    }

    /// Sets the tombstone retention window in days.
    #[must_use]
    pub const fn tombstone_retention_days(mut self, days: u32) -> Self {
        self.tombstone_retention_days = days;
        self
    }

    /// Sets whether tombstones keep a copy of the deleted record.
    #[must_use]
    pub const fn keep_tombstone_snapshots(mut self, value: bool) -> Self {
        self.keep_tombstone_snapshots = value;
        self
    }

    /// Sets whether to reconcile tombstones on open.
    #[must_use]
    pub const fn reconcile_on_open(mut self, value: bool) -> Self {
        self.reconcile_on_open = value;
        self
    }

    /// Sets the slow-drain warning threshold.
    #[must_use]
    pub const fn drain_warning_after(mut self, after: Duration) -> Self {
        self.drain_warning_after = after;
        self
    }

    /// Sets the write-guard acquire timeout.
    #[must_use]
    pub const fn acquire_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Sets how many records are sampled per collection for size estimates.
    #[must_use]
    pub const fn estimate_sample_size(mut self, n: usize) -> Self {
        self.estimate_sample_size = n;
        self
    }

    /// Sets whether to sync the snapshot on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }
}
