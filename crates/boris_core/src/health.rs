//! Health and diagnostics.
//!
//! Cheap metrics for the settings screen and `boris health`: record counts
//! come from [`Database::count`], never from full reads, and the export
//! size is estimated from a sample.

use crate::database::Database;
use crate::error::CoreResult;
use crate::schema::{stores, SchemaVersion};
use crate::stats::StatsSnapshot;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// A point-in-time view of the database's health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthMetrics {
    /// Records per collection.
    pub counts: BTreeMap<String, usize>,
    /// Records across all collections, tombstones included.
    pub total_records: usize,
    /// Estimated size of a full export in bytes.
    pub estimated_export_bytes: u64,
    /// Schema version of the open database.
    pub schema_version: SchemaVersion,
    /// Whether an exclusive operation holds the write guard.
    pub guard_enabled: bool,
    /// Writes currently in flight.
    pub active_writes: usize,
    /// Soft-deleted records awaiting purge.
    pub tombstones: usize,
    /// Gateway counters since open.
    pub stats: StatsSnapshot,
}

impl HealthMetrics {
    /// Collects metrics from a database.
    pub fn collect(db: &Database) -> CoreResult<Self> {
        let mut counts = BTreeMap::new();
        for name in db.list_store_names()? {
            let count = db.count(&name)?;
            counts.insert(name, count);
        }

        let metrics = Self {
            total_records: counts.values().sum(),
            tombstones: counts.get(stores::TOMBSTONES).copied().unwrap_or(0),
            counts,
            estimated_export_bytes: db.backups().estimated_export_size()?,
            schema_version: db.schema_version(),
            guard_enabled: db.guard().is_enabled(),
            active_writes: db.guard().active_writes(),
            stats: db.stats().snapshot(),
        };
        debug!(
            total_records = metrics.total_records,
            estimated_export_bytes = metrics.estimated_export_bytes,
            "health metrics collected"
        );
        Ok(metrics)
    }

    /// Returns live records, excluding tombstones.
    #[must_use]
    pub fn live_records(&self) -> usize {
        self.total_records - self.tombstones
    }
}
