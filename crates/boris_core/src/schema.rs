//! Schema versioning and append-only upgrades.
//!
//! The set of collections and indexes is described by numbered
//! [`SchemaStep`]s. Opening a database walks every step between the stored
//! version and the current one, in ascending order and without skipping.
//!
//! ## Design Philosophy
//!
//! - **Append-only**: a step can only create collections and indexes. There
//!   is no drop or rename operation, so a bundle exported by any older
//!   version still imports cleanly.
//! - **Forward-only**: opening a snapshot written by a newer schema fails.
//! - **Declarative**: steps are plain data, applied to a [`SchemaTarget`].
//!
//! ## Usage
//!
//! ```rust
//! use boris_core::schema::{Schema, SchemaStep};
//!
//! let mut schema = Schema::new();
//! schema
//!     .register(SchemaStep::new(1, "initial").create_collection("notes", "id"))
//!     .unwrap();
//! schema
//!     .register(SchemaStep::new(2, "notes_by_date").create_index("notes", "date", "date"))
//!     .unwrap();
//!
//! assert!(schema.validate().is_ok());
//! assert_eq!(schema.current_version(), 2);
//! ```

use crate::error::{CoreError, CoreResult};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Version number for schema steps.
pub type SchemaVersion = u32;

/// Names of the collections in the BORIS schema.
pub mod stores {
    /// Tasks.
    pub const TASKS: &str = "tasks";
    /// Projects grouping tasks.
    pub const PROJECTS: &str = "projects";
    /// Unsorted captured items.
    pub const INBOX: &str = "inbox";
    /// Journal entries.
    pub const JOURNAL: &str = "journal";
    /// User lists.
    pub const LISTS: &str = "lists";
    /// Items of user lists.
    pub const LIST_ITEMS: &str = "list_items";
    /// Habits.
    pub const HABITS: &str = "habits";
    /// Daily habit check-ins.
    pub const HABIT_LOGS: &str = "habit_logs";
    /// Key-value application settings.
    pub const SETTINGS: &str = "settings";
    /// Soft-delete markers.
    pub const TOMBSTONES: &str = "tombstones";
}

/// A secondary index definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    /// Index name, unique within its collection.
    pub name: String,
    /// Record field the index covers.
    pub field: String,
}

/// A collection as defined after all steps up to some version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionDef {
    /// Collection name.
    pub name: String,
    /// Field holding each record's key.
    pub key_path: String,
    /// Schema version that introduced the collection.
    pub since: SchemaVersion,
    /// Secondary indexes, in creation order.
    pub indexes: Vec<IndexDef>,
}

/// A single additive schema operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaOp {
    /// Create a collection.
    CreateCollection {
        /// Name of the collection.
        name: String,
        /// Field holding each record's key.
        key_path: String,
    },
    /// Create an index on an existing collection.
    CreateIndex {
        /// Collection the index is on.
        collection: String,
        /// Name of the index.
        index: String,
        /// Indexed field.
        field: String,
    },
}

/// One numbered schema version.
#[derive(Debug, Clone)]
pub struct SchemaStep {
    version: SchemaVersion,
    name: String,
    ops: Vec<SchemaOp>,
}

impl SchemaStep {
    /// Creates an empty step.
    #[must_use]
    pub fn new(version: SchemaVersion, name: impl Into<String>) -> Self {
        Self {
            version,
            name: name.into(),
            ops: Vec::new(),
        }
    }

    /// Adds a create-collection operation.
    #[must_use]
    pub fn create_collection(mut self, name: &str, key_path: &str) -> Self {
        self.ops.push(SchemaOp::CreateCollection {
            name: name.to_string(),
            key_path: key_path.to_string(),
        });
        self
    }

    /// Adds a create-index operation.
    #[must_use]
    pub fn create_index(mut self, collection: &str, index: &str, field: &str) -> Self {
        self.ops.push(SchemaOp::CreateIndex {
            collection: collection.to_string(),
            index: index.to_string(),
            field: field.to_string(),
        });
        self
    }

    /// Returns the version number.
    #[must_use]
    pub fn version(&self) -> SchemaVersion {
        self.version
    }

    /// Returns the step name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the operations of this step.
    #[must_use]
    pub fn ops(&self) -> &[SchemaOp] {
        &self.ops
    }
}

/// Something a schema step can be applied to.
pub trait SchemaTarget {
    /// Creates an empty collection.
    fn create_collection(&mut self, name: &str, key_path: &str) -> CoreResult<()>;

    /// Creates an index, populating it from existing records.
    fn create_index(&mut self, collection: &str, index: &str, field: &str) -> CoreResult<()>;
}

/// Result of walking a database forward.
#[derive(Debug, Clone)]
pub struct UpgradeReport {
    /// Version before the upgrade.
    pub from: SchemaVersion,
    /// Version after the upgrade.
    pub to: SchemaVersion,
    /// Steps applied, as `(version, name)`.
    pub applied: Vec<(SchemaVersion, String)>,
}

impl UpgradeReport {
    /// Returns true if any step ran.
    #[must_use]
    pub fn upgraded(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// An ordered set of schema steps.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    steps: BTreeMap<SchemaVersion, SchemaStep>,
}

impl Schema {
    /// Creates an empty schema (version 0).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The BORIS OS schema.
    #[must_use]
    pub fn boris() -> Self {
        use stores::*;

        let steps = [
            SchemaStep::new(1, "core_planning")
                .create_collection(TASKS, "id")
                .create_index(TASKS, "status", "status")
                .create_index(TASKS, "project_id", "project_id")
                .create_index(TASKS, "updated_at", "updated_at")
                .create_collection(PROJECTS, "id")
                .create_index(PROJECTS, "status", "status")
                .create_collection(INBOX, "id")
                .create_index(INBOX, "created_at", "created_at"),
            SchemaStep::new(2, "journal_and_lists")
                .create_collection(JOURNAL, "id")
                .create_index(JOURNAL, "date", "date")
                .create_collection(LISTS, "id")
                .create_collection(LIST_ITEMS, "id")
                .create_index(LIST_ITEMS, "list_id", "list_id"),
            SchemaStep::new(3, "habits")
                .create_collection(HABITS, "id")
                .create_collection(HABIT_LOGS, "id")
                .create_index(HABIT_LOGS, "habit_id", "habit_id")
                .create_index(HABIT_LOGS, "date", "date"),
            SchemaStep::new(4, "settings").create_collection(SETTINGS, "key"),
            SchemaStep::new(5, "tombstones")
                .create_collection(TOMBSTONES, "key")
                .create_index(TOMBSTONES, "store", "store")
                .create_index(TOMBSTONES, "deletedAt", "deletedAt"),
            SchemaStep::new(6, "updated_at_indexes")
                .create_index(PROJECTS, "updated_at", "updated_at")
                .create_index(INBOX, "updated_at", "updated_at")
                .create_index(JOURNAL, "updated_at", "updated_at")
                .create_index(HABITS, "updated_at", "updated_at"),
        ];

        let mut schema = Self::new();
        for step in steps {
            schema.steps.insert(step.version(), step);
        }
        schema
    }

    /// Registers a step.
    ///
    /// Returns an error if a step with the same version already exists.
    pub fn register(&mut self, step: SchemaStep) -> CoreResult<()> {
        let version = step.version();
        if self.steps.contains_key(&version) {
            return Err(CoreError::migration_failed(format!(
                "schema version {} already registered",
                version
            )));
        }
        self.steps.insert(version, step);
        Ok(())
    }

    /// Returns the highest registered version (0 if none).
    #[must_use]
    pub fn current_version(&self) -> SchemaVersion {
        self.steps.keys().next_back().copied().unwrap_or(0)
    }

    /// Returns the steps after `from`, in order.
    #[must_use]
    pub fn pending(&self, from: SchemaVersion) -> Vec<&SchemaStep> {
        self.steps
            .range(from.saturating_add(1)..)
            .map(|(_, step)| step)
            .collect()
    }

    /// Validates that steps are sequential from 1 and internally consistent.
    pub fn validate(&self) -> CoreResult<()> {
        for (i, version) in self.steps.keys().enumerate() {
            let expected = (i + 1) as SchemaVersion;
            if *version != expected {
                return Err(CoreError::migration_failed(format!(
                    "schema version gap: expected {}, got {}",
                    expected, version
                )));
            }
        }

        let mut collections = BTreeSet::new();
        let mut indexes = BTreeSet::new();
        for step in self.steps.values() {
            for op in step.ops() {
                match op {
                    SchemaOp::CreateCollection { name, .. } => {
                        if !collections.insert(name.clone()) {
                            return Err(CoreError::migration_failed(format!(
                                "v{}: collection {} created twice",
                                step.version(),
                                name
                            )));
                        }
                    }
                    SchemaOp::CreateIndex {
                        collection, index, ..
                    } => {
                        if !collections.contains(collection) {
                            return Err(CoreError::migration_failed(format!(
                                "v{}: index {} on unknown collection {}",
                                step.version(),
                                index,
                                collection
                            )));
                        }
                        if !indexes.insert((collection.clone(), index.clone())) {
                            return Err(CoreError::migration_failed(format!(
                                "v{}: index {} on {} created twice",
                                step.version(),
                                index,
                                collection
                            )));
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Returns the collection layout at `version`, in name order.
    #[must_use]
    pub fn collections_at(&self, version: SchemaVersion) -> Vec<CollectionDef> {
        let mut defs: BTreeMap<String, CollectionDef> = BTreeMap::new();
        for step in self.steps.range(..=version).map(|(_, s)| s) {
            for op in step.ops() {
                match op {
                    SchemaOp::CreateCollection { name, key_path } => {
                        defs.insert(
                            name.clone(),
                            CollectionDef {
                                name: name.clone(),
                                key_path: key_path.clone(),
                                since: step.version(),
                                indexes: Vec::new(),
                            },
                        );
                    }
                    SchemaOp::CreateIndex {
                        collection,
                        index,
                        field,
                    } => {
                        if let Some(def) = defs.get_mut(collection) {
                            def.indexes.push(IndexDef {
                                name: index.clone(),
                                field: field.clone(),
                            });
                        }
                    }
                }
            }
        }
        defs.into_values().collect()
    }

    /// Returns the collection layout at the current version.
    #[must_use]
    pub fn collections(&self) -> Vec<CollectionDef> {
        self.collections_at(self.current_version())
    }

    /// Returns one collection's definition at the current version.
    #[must_use]
    pub fn collection(&self, name: &str) -> Option<CollectionDef> {
        self.collections().into_iter().find(|c| c.name == name)
    }

    /// Walks `target` from `old` to `new`, one step at a time.
    ///
    /// # Errors
    ///
    /// Fails if `new < old`, `new` is beyond the current version, a step in
    /// between is missing, or the target rejects an operation.
    pub fn upgrade<T: SchemaTarget>(
        &self,
        old: SchemaVersion,
        new: SchemaVersion,
        target: &mut T,
    ) -> CoreResult<UpgradeReport> {
        if new < old {
            return Err(CoreError::migration_failed(format!(
                "refusing to downgrade schema from v{} to v{}",
                old, new
            )));
        }
        if new > self.current_version() {
            return Err(CoreError::migration_failed(format!(
                "unknown schema version v{} (latest is v{})",
                new,
                self.current_version()
            )));
        }

        let mut applied = Vec::new();
        for version in old.saturating_add(1)..=new {
            let step = self.steps.get(&version).ok_or_else(|| {
                CoreError::migration_failed(format!("missing schema step v{}", version))
            })?;

            for op in step.ops() {
                debug!(version, ?op, "applying schema operation");
                match op {
                    SchemaOp::CreateCollection { name, key_path } => {
                        target.create_collection(name, key_path)?;
                    }
                    SchemaOp::CreateIndex {
                        collection,
                        index,
                        field,
                    } => target.create_index(collection, index, field)?,
                }
            }

            info!(version, name = step.name(), "schema step applied");
            applied.push((version, step.name().to_string()));
        }

        Ok(UpgradeReport {
            from: old,
            to: new,
            applied,
        })
    }
}
