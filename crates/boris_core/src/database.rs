//! Storage gateway.
//!
//! [`Database`] owns every collection of a BORIS database and is the only
//! component that touches the storage backend. Records live in memory,
//! indexed per the [`Schema`]; every committed [`WriteBatch`] replaces the
//! persisted snapshot atomically.
//!
//! ## Snapshot format
//!
//! ```text
//! { "format": 1, "schemaVersion": 6, "collections": { "tasks": [ {...}, ... ], ... } }
//! ```
//!
//! Indexes are not persisted; they are rebuilt when the snapshot is loaded.

use crate::backup::BackupManager;
use crate::change_feed::{ChangeEvent, ChangeFeed, ChangeType, EventSink};
use crate::config::Config;
use crate::dir::DatabaseDir;
use crate::entity::EntityStore;
use crate::error::{CoreError, CoreResult};
use crate::guard::WriteGuard;
use crate::health::HealthMetrics;
use crate::index::{FieldIndex, IndexKey};
use crate::record::Record;
use crate::schema::{Schema, SchemaTarget, SchemaVersion};
use crate::stats::DatabaseStats;
use crate::tombstone::TombstoneManager;
use crate::types::SequenceNumber;
use boris_storage::{FileBackend, InMemoryBackend, StorageBackend};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::ops::Bound;
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Current snapshot layout version.
const SNAPSHOT_FORMAT: u32 = 1;

/// A single operation of a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Insert or replace a record.
    Put {
        /// Target collection.
        store: String,
        /// The record; its key is read from the collection's key path.
        record: Record,
    },
    /// Remove a record if present.
    Delete {
        /// Target collection.
        store: String,
        /// Key of the record.
        key: String,
    },
    /// Remove every record of a collection.
    Clear {
        /// Target collection.
        store: String,
    },
}

/// An ordered list of writes committed atomically.
///
/// Either every operation is applied and persisted, or none is.
///
/// ```rust
/// use boris_core::{Database, Record, WriteBatch};
/// use serde_json::json;
///
/// let db = Database::open_in_memory().unwrap();
/// let task = Record::from_value(json!({ "id": "t1", "title": "Plan week" })).unwrap();
///
/// let mut batch = WriteBatch::new();
/// batch.put("tasks", task).delete("inbox", "i1");
/// db.apply(batch).unwrap();
///
/// assert!(db.get("tasks", "t1").unwrap().is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an upsert.
    pub fn put(&mut self, store: impl Into<String>, record: Record) -> &mut Self {
        self.ops.push(WriteOp::Put {
            store: store.into(),
            record,
        });
        self
    }

    /// Adds a removal.
    pub fn delete(&mut self, store: impl Into<String>, key: impl Into<String>) -> &mut Self {
        self.ops.push(WriteOp::Delete {
            store: store.into(),
            key: key.into(),
        });
        self
    }

    /// Adds a clear of a whole collection.
    pub fn clear(&mut self, store: impl Into<String>) -> &mut Self {
        self.ops.push(WriteOp::Clear {
            store: store.into(),
        });
        self
    }

    /// Returns the operations in order.
    #[must_use]
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Returns the number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if the batch has no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Collection {
    key_path: String,
    records: BTreeMap<String, Record>,
    indexes: BTreeMap<String, FieldIndex>,
}

impl Collection {
    fn new(key_path: &str) -> Self {
        Self {
            key_path: key_path.to_string(),
            records: BTreeMap::new(),
            indexes: BTreeMap::new(),
        }
    }

    /// Inserts or replaces a record; returns true if it replaced one.
    fn insert(&mut self, key: String, record: Record) -> bool {
        if let Some(old) = self.records.get(&key) {
            for index in self.indexes.values_mut() {
                index.remove(&key, old);
            }
        }
        for index in self.indexes.values_mut() {
            index.insert(&key, &record);
        }
        self.records.insert(key, record).is_some()
    }

    fn remove(&mut self, key: &str) -> Option<Record> {
        let old = self.records.remove(key)?;
        for index in self.indexes.values_mut() {
            index.remove(key, &old);
        }
        Some(old)
    }

    fn clear(&mut self) -> usize {
        let removed = self.records.len();
        self.records.clear();
        for index in self.indexes.values_mut() {
            index.clear();
        }
        removed
    }

    fn index(&self, store: &str, name: &str) -> CoreResult<&FieldIndex> {
        self.indexes
            .get(name)
            .ok_or_else(|| CoreError::index_not_found(store, name))
    }

    fn resolve(&self, keys: Vec<String>) -> Vec<Record> {
        keys.iter()
            .filter_map(|key| self.records.get(key).cloned())
            .collect()
    }
}

/// In-memory state behind the gateway lock.
#[derive(Debug, Clone, Default)]
struct State {
    schema_version: SchemaVersion,
    collections: BTreeMap<String, Collection>,
    sequence: SequenceNumber,
}

impl State {
    /// Builds the empty layout of `version` without running upgrade steps.
    fn at_version(schema: &Schema, version: SchemaVersion) -> Self {
        let mut collections = BTreeMap::new();
        for def in schema.collections_at(version) {
            let mut collection = Collection::new(&def.key_path);
            for index in def.indexes {
                collection
                    .indexes
                    .insert(index.name, FieldIndex::new(index.field));
            }
            collections.insert(def.name, collection);
        }
        Self {
            schema_version: version,
            collections,
            sequence: SequenceNumber::default(),
        }
    }

    /// Rebuilds state from a decoded snapshot.
    fn restore(schema: &Schema, snapshot: PersistedState) -> CoreResult<Self> {
        let mut state = Self::at_version(schema, snapshot.schema_version);
        for (name, values) in snapshot.collections {
            let collection = state.collections.get_mut(&name).ok_or_else(|| {
                CoreError::storage_unavailable(format!(
                    "snapshot contains unknown collection {name}"
                ))
            })?;
            for value in values {
                let record = Record::from_value(value)
                    .map_err(|e| CoreError::storage_unavailable(format!("corrupt snapshot: {e}")))?;
                let key = record
                    .require_key(&name, &collection.key_path)
                    .map_err(|e| CoreError::storage_unavailable(format!("corrupt snapshot: {e}")))?
                    .to_string();
                collection.insert(key, record);
            }
        }
        Ok(state)
    }

    fn collection(&self, store: &str) -> CoreResult<&Collection> {
        self.collections
            .get(store)
            .ok_or_else(|| CoreError::collection_not_found(store))
    }

    fn collection_mut(&mut self, store: &str) -> CoreResult<&mut Collection> {
        self.collections
            .get_mut(store)
            .ok_or_else(|| CoreError::collection_not_found(store))
    }

    /// Validates every operation without changing anything.
    fn check(&self, batch: &WriteBatch) -> CoreResult<()> {
        for op in batch.ops() {
            match op {
                WriteOp::Put { store, record } => {
                    let collection = self.collection(store)?;
                    record.require_key(store, &collection.key_path)?;
                }
                WriteOp::Delete { store, .. } | WriteOp::Clear { store } => {
                    self.collection(store)?;
                }
            }
        }
        Ok(())
    }

    /// Applies checked operations, returning the resulting events.
    fn apply_ops(&mut self, ops: Vec<WriteOp>, sequence: u64) -> CoreResult<Vec<ChangeEvent>> {
        let mut events = Vec::with_capacity(ops.len());
        for op in ops {
            match op {
                WriteOp::Put { store, record } => {
                    let collection = self.collection_mut(&store)?;
                    let key = record.require_key(&store, &collection.key_path)?.to_string();
                    let replaced = collection.insert(key.clone(), record);
                    events.push(if replaced {
                        ChangeEvent::update(sequence, store, key)
                    } else {
                        ChangeEvent::insert(sequence, store, key)
                    });
                }
                WriteOp::Delete { store, key } => {
                    if self.collection_mut(&store)?.remove(&key).is_some() {
                        events.push(ChangeEvent::delete(sequence, store, key));
                    }
                }
                WriteOp::Clear { store } => {
                    self.collection_mut(&store)?.clear();
                    events.push(ChangeEvent::clear(sequence, store));
                }
            }
        }
        Ok(events)
    }

    fn encode(&self) -> CoreResult<Vec<u8>> {
        let snapshot = PersistedRef {
            format: SNAPSHOT_FORMAT,
            schema_version: self.schema_version,
            collections: self
                .collections
                .iter()
                .map(|(name, c)| (name.as_str(), c.records.values().collect()))
                .collect(),
        };
        Ok(serde_json::to_vec(&snapshot)?)
    }

    fn total_records(&self) -> usize {
        self.collections.values().map(|c| c.records.len()).sum()
    }
}

impl SchemaTarget for State {
    fn create_collection(&mut self, name: &str, key_path: &str) -> CoreResult<()> {
        if self.collections.contains_key(name) {
            return Err(CoreError::migration_failed(format!(
                "collection {name} already exists"
            )));
        }
        self.collections
            .insert(name.to_string(), Collection::new(key_path));
        Ok(())
    }

    fn create_index(&mut self, collection: &str, index: &str, field: &str) -> CoreResult<()> {
        let target = self.collection_mut(collection)?;
        if target.indexes.contains_key(index) {
            return Err(CoreError::migration_failed(format!(
                "index {index} on {collection} already exists"
            )));
        }
        let mut built = FieldIndex::new(field);
        built.rebuild(target.records.iter());
        target.indexes.insert(index.to_string(), built);
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedState {
    format: u32,
    schema_version: SchemaVersion,
    #[serde(default)]
    collections: BTreeMap<String, Vec<Value>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PersistedRef<'a> {
    format: u32,
    schema_version: SchemaVersion,
    collections: BTreeMap<&'a str, Vec<&'a Record>>,
}

/// The BORIS storage gateway.
///
/// # Opening a Database
///
/// ```rust,ignore
/// use boris_core::Database;
/// use std::path::Path;
///
/// let db = Database::open(Path::new("boris-data"))?;
/// println!("schema v{}", db.schema_version());
/// ```
///
/// For tests, `Database::open_in_memory()` gives a non-persistent database.
///
/// Multi-step callers (entity stores, tombstones, import) wrap their
/// mutations in [`Database::run_write`]; gateway methods themselves never
/// wait on the write guard.
pub struct Database {
    config: Config,
    schema: Schema,
    /// Holds the directory lock. None for backend-only databases.
    dir: Option<DatabaseDir>,
    state: RwLock<State>,
    backend: Mutex<Box<dyn StorageBackend>>,
    guard: WriteGuard,
    stats: DatabaseStats,
    feed: ChangeFeed,
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
    is_open: RwLock<bool>,
}

impl Database {
    /// Opens (or creates) the database in a directory.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if another connection holds the
    /// directory, the snapshot cannot be read, or it was written by a newer
    /// schema.
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens the database in a directory with custom configuration.
    ///
    /// ```rust,ignore
    /// use boris_core::{Config, Database};
    /// use std::path::Path;
    ///
    /// let config = Config::default().tombstone_retention_days(14);
    /// let db = Database::open_with_config(Path::new("boris-data"), config)?;
    /// ```
    pub fn open_with_config(path: &Path, config: Config) -> CoreResult<Self> {
        let dir = DatabaseDir::open(path, config.create_if_missing)?;

        if !config.create_if_missing && dir.is_new_database() {
            return Err(CoreError::storage_unavailable(format!(
                "no database at {} and create_if_missing is false",
                path.display()
            )));
        }

        let backend = FileBackend::open(&dir.data_path()).map_err(|e| {
            CoreError::storage_unavailable(format!("cannot open snapshot: {e}"))
        })?;
        backend.discard_stale_temp().map_err(|e| {
            CoreError::storage_unavailable(format!("cannot remove stale snapshot temp: {e}"))
        })?;

        Self::open_inner(config, Some(dir), Box::new(backend), Schema::boris())
    }

    /// Opens a database on a pre-configured backend.
    pub fn open_with_backend(config: Config, backend: Box<dyn StorageBackend>) -> CoreResult<Self> {
        Self::open_inner(config, None, backend, Schema::boris())
    }

    /// Opens a database on a backend with a custom schema.
    pub fn open_with_schema(
        config: Config,
        backend: Box<dyn StorageBackend>,
        schema: Schema,
    ) -> CoreResult<Self> {
        Self::open_inner(config, None, backend, schema)
    }

    /// Opens a fresh in-memory database.
    ///
    /// Data is lost when the database is dropped.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open_with_backend(Config::default(), Box::new(InMemoryBackend::new()))
    }

    fn open_inner(
        config: Config,
        dir: Option<DatabaseDir>,
        mut backend: Box<dyn StorageBackend>,
        schema: Schema,
    ) -> CoreResult<Self> {
        schema.validate()?;
        let target = schema.current_version();

        let raw = backend
            .load()
            .map_err(|e| CoreError::storage_unavailable(format!("cannot read snapshot: {e}")))?;

        let (mut state, stored) = match raw {
            Some(bytes) => {
                let snapshot: PersistedState = serde_json::from_slice(&bytes).map_err(|e| {
                    CoreError::storage_unavailable(format!("unreadable snapshot: {e}"))
                })?;
                if snapshot.format != SNAPSHOT_FORMAT {
                    return Err(CoreError::storage_unavailable(format!(
                        "unsupported snapshot format {}",
                        snapshot.format
                    )));
                }
                if snapshot.schema_version > target {
                    return Err(CoreError::storage_unavailable(format!(
                        "snapshot schema v{} is newer than supported v{}",
                        snapshot.schema_version, target
                    )));
                }
                let stored = snapshot.schema_version;
                (State::restore(&schema, snapshot)?, stored)
            }
            None => (State::default(), 0),
        };

        let report = schema.upgrade(stored, target, &mut state)?;
        state.schema_version = target;

        if report.upgraded() {
            let bytes = state.encode()?;
            backend.replace(&bytes)?;
            backend.sync()?;
            info!(from = report.from, to = report.to, "schema upgraded");
        }

        info!(
            schema_version = target,
            collections = state.collections.len(),
            records = state.total_records(),
            "database opened"
        );

        let db = Self {
            guard: WriteGuard::new(config.drain_warning_after, config.acquire_timeout),
            config,
            schema,
            dir,
            state: RwLock::new(state),
            backend: Mutex::new(backend),
            stats: DatabaseStats::new(),
            feed: ChangeFeed::new(),
            sinks: RwLock::new(Vec::new()),
            is_open: RwLock::new(true),
        };

        if db.config.reconcile_on_open && db.schema.collection(crate::schema::stores::TOMBSTONES).is_some() {
            db.tombstones().reconcile()?;
        }

        Ok(db)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Gets a record by key.
    pub fn get(&self, store: &str, key: &str) -> CoreResult<Option<Record>> {
        self.ensure_open()?;
        let state = self.state.read();
        let collection = state.collection(store)?;
        self.stats.record_read();
        Ok(collection.records.get(key).cloned())
    }

    /// Returns every record of a collection, in key order.
    pub fn get_all(&self, store: &str) -> CoreResult<Vec<Record>> {
        self.ensure_open()?;
        let state = self.state.read();
        let collection = state.collection(store)?;
        self.stats.record_scan();
        Ok(collection.records.values().cloned().collect())
    }

    /// Returns records whose indexed field equals `value`.
    ///
    /// Values that cannot be indexed (booleans, null, arrays, objects)
    /// match nothing.
    pub fn get_by_index(&self, store: &str, index: &str, value: &Value) -> CoreResult<Vec<Record>> {
        self.ensure_open()?;
        let state = self.state.read();
        let collection = state.collection(store)?;
        let field_index = collection.index(store, index)?;
        self.stats.record_index_lookup();

        Ok(match IndexKey::from_value(value) {
            Some(key) => collection.resolve(field_index.lookup(&key)),
            None => Vec::new(),
        })
    }

    /// Returns records whose indexed field lies in `[lower, upper]`.
    ///
    /// A `None` bound is unbounded. Results are in index order.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a bound is not a number or string.
    pub fn get_by_index_range(
        &self,
        store: &str,
        index: &str,
        lower: Option<&Value>,
        upper: Option<&Value>,
    ) -> CoreResult<Vec<Record>> {
        self.ensure_open()?;
        let lower = range_bound(lower)?;
        let upper = range_bound(upper)?;

        let state = self.state.read();
        let collection = state.collection(store)?;
        let field_index = collection.index(store, index)?;
        self.stats.record_index_lookup();

        Ok(collection.resolve(field_index.range(lower, upper)))
    }

    /// Returns the number of records in a collection.
    pub fn count(&self, store: &str) -> CoreResult<usize> {
        self.ensure_open()?;
        Ok(self.state.read().collection(store)?.records.len())
    }

    /// Returns up to `limit` records of a collection, in key order.
    pub fn sample(&self, store: &str, limit: usize) -> CoreResult<Vec<Record>> {
        self.ensure_open()?;
        let state = self.state.read();
        Ok(state
            .collection(store)?
            .records
            .values()
            .take(limit)
            .cloned()
            .collect())
    }

    /// Returns the names of all collections, sorted.
    pub fn list_store_names(&self) -> CoreResult<Vec<String>> {
        self.ensure_open()?;
        Ok(self.state.read().collections.keys().cloned().collect())
    }

    /// Returns the key path of a collection.
    pub fn key_path(&self, store: &str) -> CoreResult<String> {
        self.ensure_open()?;
        Ok(self.state.read().collection(store)?.key_path.clone())
    }

    /// Returns the index names of a collection, sorted.
    pub fn index_names(&self, store: &str) -> CoreResult<Vec<String>> {
        self.ensure_open()?;
        Ok(self
            .state
            .read()
            .collection(store)?
            .indexes
            .keys()
            .cloned()
            .collect())
    }

    /// Returns the schema version of the open database.
    #[must_use]
    pub fn schema_version(&self) -> SchemaVersion {
        self.state.read().schema_version
    }

    /// Returns the schema the database was opened with.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the total number of records across collections.
    #[must_use]
    pub fn total_records(&self) -> usize {
        self.state.read().total_records()
    }

    /// Returns the sequence number of the last committed batch.
    #[must_use]
    pub fn committed_seq(&self) -> SequenceNumber {
        self.state.read().sequence
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Commits a batch atomically and returns its change events.
    ///
    /// Every operation is validated before anything changes. If persisting
    /// the snapshot fails, the in-memory state is rolled back and the error
    /// returned.
    pub fn apply(&self, batch: WriteBatch) -> CoreResult<Vec<ChangeEvent>> {
        self.ensure_open()?;
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let ops_len = batch.len();
        let events = {
            let mut state = self.state.write();
            if let Err(e) = state.check(&batch) {
                self.stats.record_error();
                return Err(e);
            }

            let previous = state.clone();
            let sequence = state.sequence.next();
            let events = match state.apply_ops(batch.ops, sequence.as_u64()) {
                Ok(events) => events,
                Err(e) => {
                    *state = previous;
                    self.stats.record_error();
                    return Err(e);
                }
            };

            if let Err(e) = self.persist(&state) {
                *state = previous;
                self.stats.record_error();
                warn!(error = %e, "commit failed; batch rolled back");
                return Err(e);
            }
            state.sequence = sequence;
            events
        };

        for event in &events {
            match event.change {
                ChangeType::Insert | ChangeType::Update => self.stats.record_write(),
                ChangeType::Delete => self.stats.record_delete(),
                ChangeType::Clear => {}
            }
        }
        debug!(ops = ops_len, events = events.len(), "batch committed");

        self.emit(&events);
        Ok(events)
    }

    /// Inserts or replaces a record, returning its key.
    pub fn put(&self, store: &str, record: Record) -> CoreResult<String> {
        let key = record.require_key(store, &self.key_path(store)?)?.to_string();
        let mut batch = WriteBatch::new();
        batch.put(store, record);
        self.apply(batch)?;
        Ok(key)
    }

    /// Removes a record; returns true if it existed.
    pub fn remove(&self, store: &str, key: &str) -> CoreResult<bool> {
        let mut batch = WriteBatch::new();
        batch.delete(store, key);
        Ok(!self.apply(batch)?.is_empty())
    }

    /// Removes every record of a collection.
    pub fn clear(&self, store: &str) -> CoreResult<()> {
        let mut batch = WriteBatch::new();
        batch.clear(store);
        self.apply(batch)?;
        Ok(())
    }

    fn persist(&self, state: &State) -> CoreResult<()> {
        let bytes = state.encode()?;
        let mut backend = self.backend.lock();
        backend.replace(&bytes)?;
        if self.config.sync_on_commit {
            backend.sync()?;
        }
        self.stats.record_batch(bytes.len() as u64);
        Ok(())
    }

    // ========================================================================
    // Write guard
    // ========================================================================

    /// Returns the write guard of this database.
    #[must_use]
    pub fn guard(&self) -> &WriteGuard {
        &self.guard
    }

    /// Runs a mutation through the write guard.
    ///
    /// See [`WriteGuard::run_write`].
    pub async fn run_write<F, Fut, T>(&self, op: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.guard.run_write(op).await
    }

    // ========================================================================
    // Change events
    // ========================================================================

    /// Subscribes to committed changes.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        self.feed.subscribe()
    }

    /// Returns the built-in change feed.
    #[must_use]
    pub fn change_feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Registers an additional event sink.
    pub fn add_event_sink(&self, sink: Arc<dyn EventSink>) {
        self.sinks.write().push(sink);
    }

    fn emit(&self, events: &[ChangeEvent]) {
        if events.is_empty() {
            return;
        }
        self.feed.emit_batch(events.to_vec());
        for sink in self.sinks.read().iter() {
            sink.emit_batch(events.to_vec());
        }
    }

    // ========================================================================
    // Components
    // ========================================================================

    /// Returns the tombstone manager.
    #[must_use]
    pub fn tombstones(&self) -> TombstoneManager<'_> {
        TombstoneManager::new(self)
    }

    /// Returns the backup engine.
    #[must_use]
    pub fn backups(&self) -> BackupManager<'_> {
        BackupManager::new(self)
    }

    /// Returns an entity store bound to one collection.
    pub fn entities(&self, store: &str) -> CoreResult<EntityStore<'_>> {
        EntityStore::new(self, store)
    }

    /// Collects health metrics.
    pub fn health_metrics(&self) -> CoreResult<HealthMetrics> {
        HealthMetrics::collect(self)
    }

    /// Returns gateway statistics.
    #[must_use]
    pub fn stats(&self) -> &DatabaseStats {
        &self.stats
    }

    /// Returns the database configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the database directory, if opened from a path.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(DatabaseDir::path)
    }

    /// Returns the database directory handle, if opened from a path.
    #[must_use]
    pub fn dir(&self) -> Option<&DatabaseDir> {
        self.dir.as_ref()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Flushes the backend and closes the database.
    ///
    /// Further operations fail with `StorageUnavailable`.
    pub fn close(&self) -> CoreResult<()> {
        let mut is_open = self.is_open.write();
        if !*is_open {
            return Ok(());
        }
        self.backend.lock().sync()?;
        *is_open = false;
        debug!("database closed");
        Ok(())
    }

    /// Checks if the database is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.is_open.read()
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if *self.is_open.read() {
            Ok(())
        } else {
            Err(CoreError::storage_unavailable("database is closed"))
        }
    }
}

fn range_bound(value: Option<&Value>) -> CoreResult<Bound<IndexKey>> {
    match value {
        None => Ok(Bound::Unbounded),
        Some(value) => IndexKey::from_value(value)
            .map(Bound::Included)
            .ok_or_else(|| CoreError::validation("index range bounds must be numbers or strings")),
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("is_open", &self.is_open())
            .field("schema_version", &self.schema_version())
            .field("records", &self.total_records())
            .field("committed_seq", &self.committed_seq())
            .finish_non_exhaustive()
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
