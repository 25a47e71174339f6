//! Entity store: the calling convention for feature modules.
//!
//! Tasks, projects, journal entries and the rest are plain JSON records. An
//! [`EntityStore`] binds the gateway to one collection and adds what every
//! feature needs: generated ids, timestamps, patch updates, soft delete and
//! undo. Every mutation goes through the write guard.

use crate::database::Database;
use crate::error::{CoreError, CoreResult};
use crate::record::Record;
use crate::types::iso_timestamp;
use chrono::Utc;
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

/// Field stamped once when an entity is created.
pub const CREATED_AT: &str = "created_at";

/// CRUD over one collection.
///
/// ```rust
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> boris_core::CoreResult<()> {
/// let db = boris_core::Database::open_in_memory()?;
/// let tasks = db.entities("tasks")?;
///
/// let task = tasks.create(json!({ "title": "Water plants", "status": "open" })).await?;
/// let id = task.key("id").unwrap().to_string();
///
/// tasks.update(&id, json!({ "status": "done" })).await?;
/// assert_eq!(tasks.find_by("status", &json!("done"))?.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct EntityStore<'a> {
    db: &'a Database,
    store: String,
    key_path: String,
}

impl<'a> EntityStore<'a> {
    /// Binds a store to a collection.
    ///
    /// # Errors
    ///
    /// Returns `CollectionNotFound` for unknown collections.
    pub fn new(db: &'a Database, store: &str) -> CoreResult<Self> {
        let key_path = db.key_path(store)?;
        Ok(Self {
            db,
            store: store.to_string(),
            key_path,
        })
    }

    /// Returns the collection name.
    #[must_use]
    pub fn store(&self) -> &str {
        &self.store
    }

    /// Creates an entity from `fields`.
    ///
    /// A random UUID key is assigned unless the fields already carry one;
    /// `created_at` and `updated_at` are set to now.
    pub async fn create(&self, fields: Value) -> CoreResult<Record> {
        let mut record = Record::from_value(fields)?;
        if record.key(&self.key_path).is_none() {
            record.set(self.key_path.as_str(), Uuid::new_v4().to_string());
        }
        let now = Utc::now();
        if record.get(CREATED_AT).is_none() {
            record.set(CREATED_AT, iso_timestamp(now));
        }
        record.touch(now);

        let this = self;
        let stored = record.clone();
        let key = self
            .db
            .run_write(move || async move { this.db.put(&this.store, stored) })
            .await?;
        debug!(store = %self.store, %key, "entity created");
        Ok(record)
    }

    /// Gets an entity by key.
    pub fn get(&self, id: &str) -> CoreResult<Option<Record>> {
        self.db.get(&self.store, id)
    }

    /// Lists every entity, in key order.
    pub fn list(&self) -> CoreResult<Vec<Record>> {
        self.db.get_all(&self.store)
    }

    /// Finds entities by an indexed field.
    pub fn find_by(&self, index: &str, value: &Value) -> CoreResult<Vec<Record>> {
        self.db.get_by_index(&self.store, index, value)
    }

    /// Applies a patch of fields to an entity.
    ///
    /// Returns `None` if the entity does not exist.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the patch is not an object or tries to
    /// change the key.
    pub async fn update(&self, id: &str, patch: Value) -> CoreResult<Option<Record>> {
        let Value::Object(patch) = patch else {
            return Err(CoreError::validation("patch must be an object"));
        };
        if let Some(new_key) = patch.get(&self.key_path) {
            if new_key.as_str() != Some(id) {
                return Err(CoreError::validation(format!(
                    "the `{}` of a {} record cannot change",
                    self.key_path, self.store
                )));
            }
        }

        let this = self;
        self.db
            .run_write(move || async move { this.apply_patch(id, patch) })
            .await
    }

    fn apply_patch(&self, id: &str, patch: Map<String, Value>) -> CoreResult<Option<Record>> {
        let Some(mut record) = self.db.get(&self.store, id)? else {
            return Ok(None);
        };
        for (field, value) in patch {
            record.set(field, value);
        }
        record.touch(Utc::now());
        self.db.put(&self.store, record.clone())?;
        debug!(store = %self.store, id, "entity updated");
        Ok(Some(record))
    }

    /// Soft-deletes an entity; returns false if it did not exist.
    pub async fn delete(&self, id: &str) -> CoreResult<bool> {
        self.db.tombstones().soft_delete(&self.store, id).await
    }

    /// Undoes a soft delete.
    pub async fn restore(&self, id: &str) -> CoreResult<Option<Record>> {
        self.db
            .tombstones()
            .restore_from_tombstone(&self.store, id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn create_assigns_id_and_timestamps() {
        let db = Database::open_in_memory().unwrap();
        let projects = db.entities("projects").unwrap();

        let project = projects
            .create(json!({ "name": "Garden", "status": "active" }))
            .await
            .unwrap();

        let id = project.key("id").unwrap();
        assert!(Uuid::parse_str(id).is_ok());
        assert!(project.get_str(CREATED_AT).is_some());
        assert!(project.updated_at().is_some());
        assert_eq!(projects.get(id).unwrap(), Some(project.clone()));
    }

    #[tokio::test]
    async fn settings_use_caller_key() {
        let db = Database::open_in_memory().unwrap();
        let settings = db.entities("settings").unwrap();

        let theme = settings
            .create(json!({ "key": "theme", "value": "dark" }))
            .await
            .unwrap();
        assert_eq!(theme.key("key"), Some("theme"));
        assert!(settings.get("theme").unwrap().is_some());
    }

    #[tokio::test]
    async fn update_patches_fields() {
        let db = Database::open_in_memory().unwrap();
        let tasks = db.entities("tasks").unwrap();
        let task = tasks
            .create(json!({ "title": "Draft", "status": "open" }))
            .await
            .unwrap();
        let id = task.key("id").unwrap().to_string();

        let updated = tasks
            .update(&id, json!({ "status": "done", "id": id.clone() }))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.get_str("status"), Some("done"));
        assert_eq!(updated.get_str("title"), Some("Draft"));
        assert!(tasks.find_by("status", &json!("open")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_rejects_key_change_and_missing() {
        let db = Database::open_in_memory().unwrap();
        let tasks = db.entities("tasks").unwrap();
        let task = tasks.create(json!({ "title": "x" })).await.unwrap();
        let id = task.key("id").unwrap().to_string();

        assert!(matches!(
            tasks.update(&id, json!({ "id": "other" })).await,
            Err(CoreError::Validation { .. })
        ));
        assert!(tasks
            .update("missing", json!({ "title": "y" }))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn delete_and_restore() {
        let db = Database::open_in_memory().unwrap();
        let lists = db.entities("lists").unwrap();
        let list = lists.create(json!({ "name": "Groceries" })).await.unwrap();
        let id = list.key("id").unwrap().to_string();

        assert!(lists.delete(&id).await.unwrap());
        assert!(lists.list().unwrap().is_empty());

        let restored = lists.restore(&id).await.unwrap().unwrap();
        assert_eq!(restored.get_str("name"), Some("Groceries"));
        assert_eq!(lists.list().unwrap().len(), 1);
    }

    #[test]
    fn unknown_collection() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.entities("calendar"),
            Err(CoreError::CollectionNotFound { .. })
        ));
    }
}
