//! Test fixtures and database helpers.
//!
//! Provides convenience functions for setting up test databases
//! and common test scenarios.

use boris_core::schema::stores;
use boris_core::{Database, Record};
use serde_json::json;
use std::path::PathBuf;
use tempfile::TempDir;

/// A test database with automatic cleanup.
pub struct TestDatabase {
    /// The database instance.
    pub db: Database,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestDatabase {
    /// Creates a new in-memory test database.
    pub fn memory() -> Self {
        Self {
            db: Database::open_in_memory().expect("Failed to open in-memory database"),
            _temp_dir: None,
        }
    }

    /// Creates a new file-based test database.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open(&temp_dir.path().join("boris"))
            .expect("Failed to open file database");

        Self {
            db,
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the database path if file-based, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self._temp_dir.as_ref().map(|d| d.path().join("boris"))
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Runs a test with a temporary in-memory database.
///
/// # Example
///
/// ```rust
/// use boris_testkit::with_temp_db;
///
/// with_temp_db(|db| {
///     assert_eq!(db.total_records(), 0);
/// });
/// ```
pub fn with_temp_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database) -> R,
{
    let test_db = TestDatabase::memory();
    f(&test_db.db)
}

/// Runs a test with a temporary file-based database.
pub fn with_file_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database, &std::path::Path) -> R,
{
    let test_db = TestDatabase::file();
    let path = test_db.path().expect("File database should have a path");
    f(&test_db.db, &path)
}

/// Builds a task record.
pub fn task_record(id: &str, title: &str) -> Record {
    Record::from_value(json!({
        "id": id,
        "title": title,
        "status": "open",
        "updated_at": "2026-01-01T00:00:00.000Z",
    }))
    .expect("task fixture is an object")
}

/// Puts `count` tasks (`task-0`, `task-1`, ...) and returns their ids.
pub fn seed_tasks(db: &Database, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            let id = format!("task-{i}");
            db.put(stores::TASKS, task_record(&id, &format!("Task {i}")))
                .expect("Failed to put task")
        })
        .collect()
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates a database with tasks, a project, a journal entry and a setting.
    pub fn populated_database(task_count: usize) -> TestDatabase {
        let test_db = TestDatabase::memory();
        seed_tasks(&test_db, task_count);

        let extras = [
            (stores::PROJECTS, json!({ "id": "project-1", "name": "Garden", "status": "active" })),
            (stores::JOURNAL, json!({ "id": "journal-1", "date": "2026-10-18", "text": "Quiet day" })),
            (stores::SETTINGS, json!({ "key": "theme", "value": "dark" })),
        ];
        for (store, value) in extras {
            let record = Record::from_value(value).expect("fixture is an object");
            test_db.put(store, record).expect("Failed to put fixture");
        }

        test_db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_database() {
        let test_db = TestDatabase::memory();
        assert!(test_db.path().is_none());
        assert_eq!(test_db.total_records(), 0);
    }

    #[test]
    fn test_file_database() {
        with_file_db(|db, path| {
            assert_eq!(db.path(), Some(path));
            assert!(path.join("boris.json").exists());
        });
    }

    #[test]
    fn test_populated_scenario() {
        let test_db = scenarios::populated_database(5);
        assert_eq!(test_db.count(stores::TASKS).unwrap(), 5);
        assert_eq!(test_db.total_records(), 8);
    }
}
