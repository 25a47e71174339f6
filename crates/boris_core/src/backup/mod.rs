//! Backup export, validation and import.
//!
//! A backup is a single JSON document holding every collection:
//!
//! ```text
//! {
//!   "_meta":  { "app": "boris-os", "version": 6, "exportedAt": "...",
//!               "storeCount": 10, "recordCounts": { "tasks": 42, ... } },
//!   "stores": { "tasks": [ {...}, ... ], "settings": [ {...} ], ... }
//! }
//! ```
//!
//! ## Import modes
//!
//! - **Replace** (default): takes the write guard exclusively, then clears
//!   every collection present in the bundle and writes its records, in one
//!   atomic batch.
//! - **Merge**: upserts the bundle's records in one atomic batch through the
//!   ordinary write path. Existing records with other keys are kept.
//!
//! Either way the bundle is validated first; an invalid bundle leaves the
//! database untouched. Imported records win over tombstones: a tombstone for
//! a record that is live after the import is dropped in the same batch.
//!
//! ## Usage
//!
//! ```rust
//! use boris_core::backup::ImportOptions;
//! use boris_core::{Database, Record};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> boris_core::CoreResult<()> {
//! let source = Database::open_in_memory()?;
//! source.put("tasks", Record::from_value(json!({ "id": "t1" }))?)?;
//! let bundle = serde_json::to_value(source.backups().export_bundle()?)?;
//!
//! let target = Database::open_in_memory()?;
//! let summary = target
//!     .backups()
//!     .import_bundle(&bundle, ImportOptions::default())
//!     .await?;
//! assert_eq!(summary.imported, 1);
//! # Ok(())
//! # }
//! ```

mod bundle;
mod file;
mod validate;

pub use bundle::{Bundle, BundleMeta};
pub use file::{read_bundle_file, suggested_file_name, write_bundle_file};
pub use validate::{validate_bundle, BundleExpectations, BundleReport};

use crate::database::{Database, WriteBatch};
use crate::error::{CoreError, CoreResult};
use crate::record::Record;
use crate::schema::stores as store_names;
use crate::tombstone::Tombstone;
use crate::types::iso_timestamp;
use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use validate::has_key;

/// Bytes added per collection entry in a bundle (`"name":[]` plus a comma).
const STORE_ENTRY_OVERHEAD: u64 = 6;

/// Options for [`BackupManager::import_bundle`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Upsert into existing data instead of replacing the bundle's collections.
    pub merge: bool,
}

impl ImportOptions {
    /// Replace mode.
    #[must_use]
    pub const fn replace() -> Self {
        Self { merge: false }
    }

    /// Merge mode.
    #[must_use]
    pub const fn merge() -> Self {
        Self { merge: true }
    }
}

/// Outcome of an import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Records written.
    pub imported: usize,
    /// Records written per collection.
    pub stores: BTreeMap<String, usize>,
    /// Records skipped for lacking a key.
    pub skipped: usize,
    /// Collections in the bundle that this schema does not know.
    pub unknown_stores: Vec<String>,
    /// Warnings reported by validation.
    pub warnings: Vec<String>,
    /// Tombstones dropped because their record is live after the import.
    pub tombstones_cleared: usize,
}

/// Records of a validated bundle, grouped by known collection.
struct ImportPlan {
    stores: BTreeMap<String, Vec<Record>>,
    skipped: usize,
    unknown_stores: Vec<String>,
}

/// Export, validation and import for one database.
///
/// Obtained through [`Database::backups`].
#[derive(Debug, Clone, Copy)]
pub struct BackupManager<'a> {
    db: &'a Database,
}

impl<'a> BackupManager<'a> {
    pub(crate) fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Returns what bundles are validated against.
    #[must_use]
    pub fn expectations(&self) -> BundleExpectations {
        BundleExpectations::from_schema(self.db.schema(), self.db.config().app_id.clone())
    }

    /// Exports every collection.
    ///
    /// Does not take the write guard: each collection is read atomically,
    /// but writes may land between collections.
    pub fn export_bundle(&self) -> CoreResult<Bundle> {
        let mut stores = BTreeMap::new();
        let mut record_counts = BTreeMap::new();

        for name in self.db.list_store_names()? {
            let records = self.db.get_all(&name)?;
            record_counts.insert(name.clone(), records.len());
            stores.insert(name, records);
        }

        let bundle = Bundle {
            meta: BundleMeta {
                app: self.db.config().app_id.clone(),
                version: self.db.schema_version(),
                exported_at: iso_timestamp(Utc::now()),
                store_count: stores.len(),
                record_counts,
            },
            stores,
        };

        info!(
            stores = bundle.meta.store_count,
            records = bundle.total_records(),
            "backup exported"
        );
        Ok(bundle)
    }

    /// Exports into `dir` under the suggested file name for today.
    ///
    /// Returns the path written.
    pub fn export_to_dir(&self, dir: &Path) -> CoreResult<PathBuf> {
        let bundle = self.export_bundle()?;
        let path = dir.join(suggested_file_name(Utc::now().date_naive()));
        write_bundle_file(&path, &bundle)?;
        Ok(path)
    }

    /// Validates a bundle against this database's schema and product id.
    #[must_use]
    pub fn validate_bundle(&self, bundle: &Value) -> BundleReport {
        validate_bundle(bundle, &self.expectations())
    }

    /// Validates and imports a bundle.
    ///
    /// # Errors
    ///
    /// - `InvalidBundle` with every validation error; nothing is written
    /// - `GuardTimeout` if a replace import cannot get exclusive access
    /// - storage errors from the commit, in which case nothing is written
    pub async fn import_bundle(
        &self,
        bundle: &Value,
        options: ImportOptions,
    ) -> CoreResult<ImportSummary> {
        let report = self.validate_bundle(bundle);
        if !report.valid {
            warn!(errors = report.errors.len(), "backup rejected");
            return Err(CoreError::InvalidBundle {
                errors: report.errors,
            });
        }
        for warning in &report.warnings {
            warn!(%warning, "backup warning");
        }

        let plan = self.plan(bundle)?;

        let mut summary = if options.merge {
            let this = *self;
            self.db
                .run_write(move || async move { this.commit(plan, false) })
                .await?
        } else {
            let _exclusive = self.db.guard().exclusive().await?;
            self.commit(plan, true)?
        };
        summary.warnings = report.warnings;

        info!(
            merge = options.merge,
            imported = summary.imported,
            skipped = summary.skipped,
            "backup imported"
        );
        Ok(summary)
    }

    fn plan(&self, bundle: &Value) -> CoreResult<ImportPlan> {
        let mut plan = ImportPlan {
            stores: BTreeMap::new(),
            skipped: 0,
            unknown_stores: Vec::new(),
        };

        let Some(stores) = bundle.get("stores").and_then(Value::as_object) else {
            return Ok(plan);
        };
        let known = self.db.list_store_names()?;

        for (name, value) in stores {
            if !known.contains(name) {
                plan.unknown_stores.push(name.clone());
                continue;
            }
            let key_path = self.db.key_path(name)?;
            let mut records = Vec::new();
            for raw in value.as_array().into_iter().flatten() {
                if has_key(raw, &key_path) {
                    records.push(Record::from_value(raw.clone())?);
                } else {
                    plan.skipped += 1;
                }
            }
            plan.stores.insert(name.clone(), records);
        }

        Ok(plan)
    }

    fn commit(&self, plan: ImportPlan, replace: bool) -> CoreResult<ImportSummary> {
        let mut summary = ImportSummary {
            skipped: plan.skipped,
            unknown_stores: plan.unknown_stores.clone(),
            ..ImportSummary::default()
        };

        // Tombstone keys of every record the bundle writes.
        let mut covered = BTreeSet::new();
        for (name, records) in &plan.stores {
            if name == store_names::TOMBSTONES {
                continue;
            }
            let key_path = self.db.key_path(name)?;
            for record in records {
                if let Some(id) = record.key(&key_path) {
                    covered.insert(Tombstone::key_for(name, id));
                }
            }
        }

        let mut batch = WriteBatch::new();
        for (name, records) in &plan.stores {
            if replace {
                batch.clear(name.as_str());
            }
            let mut written = 0;
            for record in records {
                if name == store_names::TOMBSTONES
                    && self.buries_live_record(&plan, record, &covered, replace)?
                {
                    summary.tombstones_cleared += 1;
                    continue;
                }
                batch.put(name.as_str(), record.clone());
                written += 1;
            }
            summary.imported += written;
            summary.stores.insert(name.clone(), written);
        }

        let replaces_tombstones = replace && plan.stores.contains_key(store_names::TOMBSTONES);
        if !replaces_tombstones {
            for key in &covered {
                if self.db.get(store_names::TOMBSTONES, key)?.is_some() {
                    batch.delete(store_names::TOMBSTONES, key.as_str());
                    summary.tombstones_cleared += 1;
                }
            }
        }

        self.db.apply(batch)?;
        if summary.tombstones_cleared > 0 {
            info!(cleared = summary.tombstones_cleared, "stale tombstones dropped by import");
        }
        Ok(summary)
    }

    /// Returns true if a bundle tombstone points at a record that will be
    /// live once the import commits.
    fn buries_live_record(
        &self,
        plan: &ImportPlan,
        raw: &Record,
        covered: &BTreeSet<String>,
        replace: bool,
    ) -> CoreResult<bool> {
        let (Some(store), Some(id)) = (raw.get_str("store"), raw.get_str("id")) else {
            return Ok(false);
        };
        if covered.contains(&Tombstone::key_for(store, id)) {
            return Ok(true);
        }
        // A replaced collection holds only bundle records, all covered above.
        if replace && plan.stores.contains_key(store) {
            return Ok(false);
        }
        match self.db.get(store, id) {
            Ok(live) => Ok(live.is_some()),
            Err(CoreError::CollectionNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Estimates the size of a full export without performing one.
    ///
    /// Per collection: `count × average encoded size` of a sample of up to
    /// `estimate_sample_size` records, plus the envelope.
    pub fn estimated_export_size(&self) -> CoreResult<u64> {
        let config = self.db.config();
        let sample_size = config.estimate_sample_size.max(1);

        let mut record_counts = BTreeMap::new();
        let mut records_bytes = 0u64;
        for name in self.db.list_store_names()? {
            let count = self.db.count(&name)?;
            if count > 0 {
                let sample = self.db.sample(&name, sample_size)?;
                let sampled: u64 = sample.iter().map(|r| r.encoded_len() as u64).sum();
                let average = if sample.is_empty() || sampled == 0 {
                    config.fallback_record_bytes
                } else {
                    sampled / sample.len() as u64
                };
                // One separator per record after the first.
                records_bytes += count as u64 * average + (count as u64 - 1);
            }
            records_bytes += name.len() as u64 + STORE_ENTRY_OVERHEAD;
            record_counts.insert(name, count);
        }

        let meta = BundleMeta {
            app: config.app_id.clone(),
            version: self.db.schema_version(),
            exported_at: iso_timestamp(Utc::now()),
            store_count: record_counts.len(),
            record_counts,
        };
        let envelope = Bundle {
            meta,
            stores: BTreeMap::new(),
        }
        .to_json()?
        .len() as u64;

        Ok(envelope + records_bytes)
    }
}
