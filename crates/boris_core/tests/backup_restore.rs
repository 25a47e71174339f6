//! End-to-end soft delete, export, validate and import.

use boris_core::backup::{read_bundle_file, write_bundle_file};
use boris_core::schema::stores;
use boris_core::{CoreError, Database, ImportOptions, Record};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use tempfile::tempdir;

fn record(value: Value) -> Record {
    Record::from_value(value).unwrap()
}

fn task(id: &str) -> Record {
    record(json!({
        "id": id,
        "title": format!("task {id}"),
        "status": "open",
        "updated_at": "2026-01-01T00:00:00.000Z"
    }))
}

fn ids(db: &Database, store: &str) -> BTreeSet<String> {
    db.get_all(store)
        .unwrap()
        .iter()
        .filter_map(|r| r.key("id").map(str::to_string))
        .collect()
}

fn export_value(db: &Database) -> Value {
    serde_json::to_value(db.backups().export_bundle().unwrap()).unwrap()
}

#[test]
fn empty_database_exports_a_valid_bundle() {
    let db = Database::open_in_memory().unwrap();

    let report = db.backups().validate_bundle(&export_value(&db));
    assert!(report.valid);
    assert!(report.errors.is_empty());
    assert!(report.warnings.iter().any(|w| w == "empty backup"));
}

#[tokio::test]
async fn replace_import_of_own_export_is_reflexive() {
    let db = Database::open_in_memory().unwrap();
    for id in ["t1", "t2", "t3"] {
        db.put(stores::TASKS, task(id)).unwrap();
    }
    let before = db.get_all(stores::TASKS).unwrap();

    let bundle = export_value(&db);
    let summary = db
        .backups()
        .import_bundle(&bundle, ImportOptions::replace())
        .await
        .unwrap();

    assert_eq!(summary.imported, 3);
    assert_eq!(db.get_all(stores::TASKS).unwrap(), before);
}

#[tokio::test]
async fn soft_delete_then_purge_everything() {
    let db = Database::open_in_memory().unwrap();
    db.put(stores::TASKS, task("abc")).unwrap();

    assert!(db.tombstones().soft_delete(stores::TASKS, "abc").await.unwrap());
    assert!(db.get(stores::TASKS, "abc").unwrap().is_none());
    assert!(db.tombstones().get(stores::TASKS, "abc").unwrap().is_some());

    assert_eq!(db.tombstones().purge_older_than(0).await.unwrap(), 1);
    assert!(db.tombstones().get(stores::TASKS, "abc").unwrap().is_none());
    assert!(db.get(stores::TASKS, "abc").unwrap().is_none());

    assert_eq!(db.tombstones().purge_older_than(0).await.unwrap(), 0);
}

#[test]
fn wrong_app_is_rejected() {
    let db = Database::open_in_memory().unwrap();

    let report = db
        .backups()
        .validate_bundle(&json!({ "_meta": { "app": "wrong-app" }, "stores": {} }));
    assert!(!report.valid);
    assert!(report.errors.iter().any(|e| e.contains("unknown app: wrong-app")));
}

#[tokio::test]
async fn invalid_bundle_leaves_database_untouched() {
    let db = Database::open_in_memory().unwrap();
    db.put(stores::TASKS, task("t1")).unwrap();
    db.put(stores::PROJECTS, record(json!({ "id": "p1", "name": "Garden" })))
        .unwrap();

    let before = db.health_metrics().unwrap().counts;
    let seq = db.committed_seq();

    let bundle = json!({
        "_meta": { "app": "boris-os", "version": 6 },
        "stores": { "tasks": "not an array", "projects": [] }
    });
    let err = db
        .backups()
        .import_bundle(&bundle, ImportOptions::replace())
        .await
        .unwrap_err();

    match err {
        CoreError::InvalidBundle { errors } => {
            assert!(errors.iter().any(|e| e.contains("stores.tasks")));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(db.health_metrics().unwrap().counts, before);
    assert_eq!(db.committed_seq(), seq);
    assert!(!db.guard().is_enabled());
}

#[tokio::test]
async fn merge_import_twice_equals_once() {
    let source = Database::open_in_memory().unwrap();
    for id in ["a", "b"] {
        source.put(stores::TASKS, task(id)).unwrap();
    }
    let bundle = export_value(&source);

    let target = Database::open_in_memory().unwrap();
    target.put(stores::TASKS, task("local")).unwrap();

    target
        .backups()
        .import_bundle(&bundle, ImportOptions::merge())
        .await
        .unwrap();
    let once = target.get_all(stores::TASKS).unwrap();

    target
        .backups()
        .import_bundle(&bundle, ImportOptions::merge())
        .await
        .unwrap();
    let twice = target.get_all(stores::TASKS).unwrap();

    assert_eq!(once, twice);
    assert_eq!(
        ids(&target, stores::TASKS),
        BTreeSet::from(["a".to_string(), "b".to_string(), "local".to_string()])
    );
}

#[tokio::test]
async fn replace_import_drops_records_missing_from_bundle() {
    let db = Database::open_in_memory().unwrap();
    for id in ["a", "b", "c"] {
        db.put(stores::TASKS, task(id)).unwrap();
    }
    db.put(stores::PROJECTS, record(json!({ "id": "p1", "name": "Garden" })))
        .unwrap();

    let bundle = json!({
        "_meta": { "app": "boris-os", "version": 6 },
        "stores": { "tasks": [task("b").into_value(), task("d").into_value()] }
    });
    let summary = db
        .backups()
        .import_bundle(&bundle, ImportOptions::replace())
        .await
        .unwrap();

    assert_eq!(summary.imported, 2);
    assert_eq!(
        ids(&db, stores::TASKS),
        BTreeSet::from(["b".to_string(), "d".to_string()])
    );
    // Collections absent from the bundle are left alone.
    assert_eq!(ids(&db, stores::PROJECTS), BTreeSet::from(["p1".to_string()]));
}

#[tokio::test]
async fn restoring_older_backup_revives_soft_deleted_task() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("db");
    let backup = temp.path().join("before-delete.json");
    {
        let db = Database::open(&path).unwrap();
        db.put(stores::TASKS, task("t1")).unwrap();
        db.put(stores::TASKS, task("t2")).unwrap();
        write_bundle_file(&backup, &db.backups().export_bundle().unwrap()).unwrap();

        db.tombstones().soft_delete(stores::TASKS, "t1").await.unwrap();
        db.tombstones().soft_delete(stores::TASKS, "t2").await.unwrap();

        let bundle = read_bundle_file(&backup).unwrap();
        let summary = db
            .backups()
            .import_bundle(&bundle, ImportOptions::replace())
            .await
            .unwrap();
        assert_eq!(summary.imported, 2);
        assert_eq!(
            ids(&db, stores::TASKS),
            BTreeSet::from(["t1".to_string(), "t2".to_string()])
        );
        assert_eq!(db.tombstones().count().unwrap(), 0);
    }

    // Reconciliation at open must not undo the restore.
    let db = Database::open(&path).unwrap();
    assert_eq!(
        ids(&db, stores::TASKS),
        BTreeSet::from(["t1".to_string(), "t2".to_string()])
    );
}

#[tokio::test]
async fn merge_import_revives_only_the_bundle_records() {
    let db = Database::open_in_memory().unwrap();
    for id in ["t1", "t2"] {
        db.put(stores::TASKS, task(id)).unwrap();
        db.tombstones().soft_delete(stores::TASKS, id).await.unwrap();
    }

    let bundle = json!({
        "_meta": { "app": "boris-os", "version": 6 },
        "stores": { "tasks": [task("t1").into_value()] }
    });
    let summary = db
        .backups()
        .import_bundle(&bundle, ImportOptions::merge())
        .await
        .unwrap();

    assert_eq!(summary.tombstones_cleared, 1);
    assert_eq!(ids(&db, stores::TASKS), BTreeSet::from(["t1".to_string()]));
    assert!(db.tombstones().get(stores::TASKS, "t1").unwrap().is_none());
    assert!(db.tombstones().get(stores::TASKS, "t2").unwrap().is_some());
}

#[tokio::test]
async fn backup_file_moves_data_between_databases() {
    let temp = tempdir().unwrap();

    let source = Database::open(&temp.path().join("source")).unwrap();
    source.put(stores::TASKS, task("t1")).unwrap();
    source
        .put(stores::SETTINGS, record(json!({ "key": "theme", "value": "dark" })))
        .unwrap();
    let path = source
        .backups()
        .export_to_dir(&temp.path().join("exports"))
        .unwrap();

    let bundle = read_bundle_file(&path).unwrap();
    let target = Database::open(&temp.path().join("target")).unwrap();
    assert!(target.backups().validate_bundle(&bundle).valid);

    target
        .backups()
        .import_bundle(&bundle, ImportOptions::replace())
        .await
        .unwrap();
    assert!(target.get(stores::TASKS, "t1").unwrap().is_some());
    assert_eq!(
        target
            .get(stores::SETTINGS, "theme")
            .unwrap()
            .unwrap()
            .get_str("value"),
        Some("dark")
    );
}

#[tokio::test]
async fn tombstones_survive_reopen_and_restore() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("db");

    {
        let db = Database::open(&path).unwrap();
        db.put(stores::TASKS, task("t1")).unwrap();
        assert!(db.tombstones().soft_delete(stores::TASKS, "t1").await.unwrap());
    }

    let db = Database::open(&path).unwrap();
    assert!(db.get(stores::TASKS, "t1").unwrap().is_none());
    assert_eq!(db.tombstones().count().unwrap(), 1);

    let restored = db
        .tombstones()
        .restore_from_tombstone(stores::TASKS, "t1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(restored.get_str("title"), Some("task t1"));
    assert_eq!(db.tombstones().count().unwrap(), 0);
}

#[test]
fn health_metrics_count_every_collection() {
    let db = Database::open_in_memory().unwrap();
    db.put(stores::TASKS, task("t1")).unwrap();
    db.put(stores::TASKS, task("t2")).unwrap();

    let health = db.health_metrics().unwrap();
    assert_eq!(health.counts.get(stores::TASKS), Some(&2));
    assert_eq!(health.total_records, 2);
    assert_eq!(health.counts.len(), db.list_store_names().unwrap().len());
    assert_eq!(
        health.estimated_export_bytes,
        db.backups().estimated_export_size().unwrap()
    );
}
