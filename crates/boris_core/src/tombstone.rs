//! Soft deletes and tombstones.
//!
//! Deleting a record through [`TombstoneManager::soft_delete`] removes it
//! from its collection and writes a tombstone into the `tombstones`
//! collection, in one atomic batch:
//!
//! ```text
//! { "key": "tasks:t1", "id": "t1", "store": "tasks",
//!   "deletedAt": "2026-10-18T09:30:00.000Z", "record": { ...deleted record... } }
//! ```
//!
//! The tombstone keeps a copy of the record (unless disabled in
//! [`Config`](crate::Config)) so the delete can be undone until the
//! tombstone is purged.
//!
//! A live record and a tombstone for the same `(store, id)` never coexist.
//! Imports drop the tombstone of every record they write; anything older is
//! repaired by [`TombstoneManager::reconcile`] at open.

use crate::database::{Database, WriteBatch};
use crate::error::{CoreError, CoreResult};
use crate::record::Record;
use crate::schema::stores;
use crate::types::{iso_timestamp, parse_timestamp};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

/// A soft-delete marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tombstone {
    /// `"<store>:<id>"`.
    pub key: String,
    /// Key of the deleted record.
    pub id: String,
    /// Collection the record was deleted from.
    pub store: String,
    /// When the record was deleted (ISO-8601).
    pub deleted_at: String,
    /// Copy of the deleted record, if kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<Record>,
}

impl Tombstone {
    /// Returns the tombstone key for a record.
    #[must_use]
    pub fn key_for(store: &str, id: &str) -> String {
        format!("{store}:{id}")
    }

    /// Creates a tombstone for a record deleted at `deleted_at`.
    #[must_use]
    pub fn new(store: &str, id: &str, deleted_at: DateTime<Utc>, record: Option<Record>) -> Self {
        Self {
            key: Self::key_for(store, id),
            id: id.to_string(),
            store: store.to_string(),
            deleted_at: iso_timestamp(deleted_at),
            record,
        }
    }

    /// Parses the deletion time.
    #[must_use]
    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.deleted_at)
    }

    /// Returns true if the deleted record can be restored.
    #[must_use]
    pub fn has_snapshot(&self) -> bool {
        self.record.is_some()
    }

    /// Converts the tombstone into a storable record.
    pub fn to_record(&self) -> CoreResult<Record> {
        Record::from_value(serde_json::to_value(self)?)
    }

    /// Reads a tombstone back from a stored record.
    pub fn from_record(record: &Record) -> CoreResult<Self> {
        serde_json::from_value(Value::Object(record.fields().clone()))
            .map_err(|e| CoreError::validation(format!("malformed tombstone: {e}")))
    }
}

/// Outcome of a reconciliation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Tombstones dropped because their record was updated after deletion.
    pub tombstones_dropped: usize,
    /// Live records removed because a newer tombstone exists.
    pub records_removed: usize,
}

impl ReconcileReport {
    /// Returns true if anything was repaired.
    #[must_use]
    pub fn repaired(&self) -> bool {
        self.tombstones_dropped + self.records_removed > 0
    }
}

/// Soft-delete, undo and purge operations.
///
/// Obtained through [`Database::tombstones`]. Mutations run through the
/// write guard, except [`reconcile`](Self::reconcile), which runs at open
/// before any writer exists.
///
/// ```rust
/// use boris_core::{Database, Record};
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> boris_core::CoreResult<()> {
/// let db = Database::open_in_memory()?;
/// db.put("tasks", Record::from_value(json!({ "id": "t1", "title": "Call Ana" }))?)?;
///
/// assert!(db.tombstones().soft_delete("tasks", "t1").await?);
/// assert!(db.get("tasks", "t1")?.is_none());
///
/// let restored = db.tombstones().restore_from_tombstone("tasks", "t1").await?;
/// assert!(restored.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TombstoneManager<'a> {
    db: &'a Database,
}

impl<'a> TombstoneManager<'a> {
    pub(crate) fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Deletes a record, leaving a tombstone.
    ///
    /// Returns `Ok(false)` if the record does not exist.
    ///
    /// # Errors
    ///
    /// Fails for unknown collections and for the `tombstones` collection
    /// itself.
    pub async fn soft_delete(&self, store: &str, id: &str) -> CoreResult<bool> {
        let this = *self;
        self.db
            .run_write(move || async move { this.soft_delete_at(store, id, Utc::now()) })
            .await
    }

    fn soft_delete_at(&self, store: &str, id: &str, now: DateTime<Utc>) -> CoreResult<bool> {
        if store == stores::TOMBSTONES {
            return Err(CoreError::validation("tombstones cannot be soft-deleted"));
        }

        let Some(record) = self.db.get(store, id)? else {
            debug!(store, id, "soft delete of missing record ignored");
            return Ok(false);
        };

        let snapshot = self.db.config().keep_tombstone_snapshots.then_some(record);
        let tombstone = Tombstone::new(store, id, now, snapshot);

        let mut batch = WriteBatch::new();
        batch
            .put(stores::TOMBSTONES, tombstone.to_record()?)
            .delete(store, id);
        self.db.apply(batch)?;

        debug!(store, id, "record soft-deleted");
        Ok(true)
    }

    /// Puts a soft-deleted record back and removes its tombstone.
    ///
    /// The record gets a fresh `updated_at`. Returns `None` if there is no
    /// tombstone or it carries no copy of the record.
    pub async fn restore_from_tombstone(&self, store: &str, id: &str) -> CoreResult<Option<Record>> {
        let this = *self;
        self.db
            .run_write(move || async move { this.restore_at(store, id, Utc::now()) })
            .await
    }

    fn restore_at(&self, store: &str, id: &str, now: DateTime<Utc>) -> CoreResult<Option<Record>> {
        let Some(tombstone) = self.get(store, id)? else {
            return Ok(None);
        };
        let Some(mut record) = tombstone.record else {
            debug!(store, id, "tombstone has no snapshot; cannot restore");
            return Ok(None);
        };

        record.touch(now);

        let mut batch = WriteBatch::new();
        batch
            .put(store, record.clone())
            .delete(stores::TOMBSTONES, tombstone.key);
        self.db.apply(batch)?;

        debug!(store, id, "record restored from tombstone");
        Ok(Some(record))
    }

    /// Removes tombstones deleted at or before `now - days`.
    ///
    /// Tombstones whose `deletedAt` cannot be parsed are removed as well.
    /// Live records are never touched. Returns the number removed.
    pub async fn purge_older_than(&self, days: u32) -> CoreResult<usize> {
        self.purge_older_than_at(days, Utc::now()).await
    }

    /// Same as [`purge_older_than`](Self::purge_older_than) with an explicit clock.
    pub async fn purge_older_than_at(&self, days: u32, now: DateTime<Utc>) -> CoreResult<usize> {
        let this = *self;
        let cutoff = now - Duration::days(i64::from(days));
        self.db
            .run_write(move || async move { this.purge_before(cutoff) })
            .await
    }

    /// Purges with the configured retention window.
    pub async fn purge_expired(&self) -> CoreResult<usize> {
        self.purge_older_than(self.db.config().tombstone_retention_days)
            .await
    }

    fn purge_before(&self, cutoff: DateTime<Utc>) -> CoreResult<usize> {
        let mut batch = WriteBatch::new();
        for raw in self.db.get_all(stores::TOMBSTONES)? {
            let eligible = match raw.get_str("deletedAt").and_then(parse_timestamp) {
                Some(deleted_at) => deleted_at <= cutoff,
                None => true,
            };
            if eligible {
                if let Some(key) = raw.key("key") {
                    batch.delete(stores::TOMBSTONES, key);
                }
            }
        }

        let purged = batch.len();
        if purged > 0 {
            self.db.apply(batch)?;
        }
        info!(purged, cutoff = %iso_timestamp(cutoff), "tombstones purged");
        Ok(purged)
    }

    /// Returns the tombstone for a record, if any.
    pub fn get(&self, store: &str, id: &str) -> CoreResult<Option<Tombstone>> {
        self.db
            .get(stores::TOMBSTONES, &Tombstone::key_for(store, id))?
            .map(|raw| Tombstone::from_record(&raw))
            .transpose()
    }

    /// Lists tombstones, newest first, optionally for one collection.
    ///
    /// Malformed tombstones (e.g. from a hand-edited backup) are skipped.
    pub fn list(&self, store: Option<&str>) -> CoreResult<Vec<Tombstone>> {
        let raw = match store {
            Some(store) => self.db.get_by_index(
                stores::TOMBSTONES,
                "store",
                &Value::String(store.to_string()),
            )?,
            None => self.db.get_all(stores::TOMBSTONES)?,
        };

        let mut tombstones: Vec<Tombstone> = raw
            .iter()
            .filter_map(|r| match Tombstone::from_record(r) {
                Ok(t) => Some(t),
                Err(e) => {
                    warn!(key = ?r.key("key"), error = %e, "skipping malformed tombstone");
                    None
                }
            })
            .collect();
        tombstones.sort_by(|a, b| b.deleted_at().cmp(&a.deleted_at()));
        Ok(tombstones)
    }

    /// Returns the number of tombstones.
    pub fn count(&self) -> CoreResult<usize> {
        self.db.count(stores::TOMBSTONES)
    }

    /// Repairs overlaps between live records and tombstones.
    ///
    /// For every tombstone whose record is live: if the record was updated
    /// after `deletedAt` the tombstone is dropped, otherwise the record is
    /// removed. A tombstone without a parseable `deletedAt` loses to the
    /// live record. All repairs are committed in one batch.
    pub fn reconcile(&self) -> CoreResult<ReconcileReport> {
        let known = self.db.list_store_names()?;
        let mut report = ReconcileReport::default();
        let mut batch = WriteBatch::new();

        for raw in self.db.get_all(stores::TOMBSTONES)? {
            let (Some(key), Some(store), Some(id)) =
                (raw.key("key"), raw.get_str("store"), raw.get_str("id"))
            else {
                continue;
            };
            if store == stores::TOMBSTONES || !known.iter().any(|k| k == store) {
                continue;
            }
            let Some(live) = self.db.get(store, id)? else {
                continue;
            };

            let deleted_at = raw.get_str("deletedAt").and_then(parse_timestamp);
            let record_wins = match (deleted_at, live.updated_at()) {
                (None, _) => true,
                (Some(deleted_at), Some(updated_at)) => updated_at > deleted_at,
                (Some(_), None) => false,
            };

            if record_wins {
                batch.delete(stores::TOMBSTONES, key);
                report.tombstones_dropped += 1;
            } else {
                batch.delete(store, id);
                report.records_removed += 1;
            }
        }

        if report.repaired() {
            self.db.apply(batch)?;
            warn!(
                tombstones_dropped = report.tombstones_dropped,
                records_removed = report.records_removed,
                "reconciled records and tombstones"
            );
        }
        Ok(report)
    }
}
