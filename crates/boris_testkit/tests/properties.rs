//! Property tests for soft delete and import.

use boris_core::schema::stores;
use boris_core::{Database, ImportOptions, Record};
use boris_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::BTreeSet;
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn task_ids(db: &Database) -> BTreeSet<String> {
    db.get_all(stores::TASKS)
        .unwrap()
        .iter()
        .filter_map(|r| r.key("id").map(str::to_string))
        .collect()
}

fn put_all(db: &Database, tasks: &[Record]) {
    for task in tasks {
        db.put(stores::TASKS, task.clone()).unwrap();
    }
}

/// Soft-deletes the tasks selected by `mask` and returns their ids.
fn bury(rt: &Runtime, db: &Database, tasks: &[Record], mask: &[bool]) -> BTreeSet<String> {
    let ids: BTreeSet<String> = tasks
        .iter()
        .zip(mask)
        .filter(|(_, delete)| **delete)
        .filter_map(|(t, _)| t.key("id").map(str::to_string))
        .collect();
    for id in &ids {
        assert!(rt.block_on(db.tombstones().soft_delete(stores::TASKS, id)).unwrap());
    }
    ids
}

fn buried_ids(db: &Database) -> BTreeSet<String> {
    db.tombstones()
        .list(Some(stores::TASKS))
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect()
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn export_always_validates(tasks in tasks_strategy(12)) {
        let db = Database::open_in_memory().unwrap();
        put_all(&db, &tasks);

        let bundle = serde_json::to_value(db.backups().export_bundle().unwrap()).unwrap();
        let report = db.backups().validate_bundle(&bundle);
        prop_assert!(report.valid);
        prop_assert!(report.errors.is_empty());
    }

    #[test]
    fn merge_import_is_idempotent(
        existing in tasks_strategy(8),
        incoming in tasks_strategy(8),
        mask in prop::collection::vec(any::<bool>(), 8),
    ) {
        let rt = runtime();
        let db = Database::open_in_memory().unwrap();
        put_all(&db, &existing);
        let buried = bury(&rt, &db, &existing, &mask);
        let bundle = bundle_with_tasks(&incoming);

        rt.block_on(db.backups().import_bundle(&bundle, ImportOptions::merge())).unwrap();
        let once = db.get_all(stores::TASKS).unwrap();
        rt.block_on(db.backups().import_bundle(&bundle, ImportOptions::merge())).unwrap();
        let twice = db.get_all(stores::TASKS).unwrap();
        prop_assert_eq!(&once, &twice);

        let incoming_ids: BTreeSet<String> = incoming
            .iter()
            .filter_map(|r| r.key("id").map(str::to_string))
            .collect();
        let expected: BTreeSet<String> = existing
            .iter()
            .filter_map(|r| r.key("id").map(str::to_string))
            .filter(|id| !buried.contains(id))
            .chain(incoming_ids.iter().cloned())
            .collect();
        prop_assert_eq!(task_ids(&db), expected);

        let still_buried: BTreeSet<String> = buried.difference(&incoming_ids).cloned().collect();
        prop_assert_eq!(buried_ids(&db), still_buried);
    }

    #[test]
    fn replace_import_leaves_exactly_the_bundle(
        existing in tasks_strategy(8),
        incoming in tasks_strategy(8),
        mask in prop::collection::vec(any::<bool>(), 8),
    ) {
        let rt = runtime();
        let db = Database::open_in_memory().unwrap();
        put_all(&db, &existing);
        let buried = bury(&rt, &db, &existing, &mask);

        let bundle = bundle_with_tasks(&incoming);
        rt.block_on(db.backups().import_bundle(&bundle, ImportOptions::replace())).unwrap();

        let expected: BTreeSet<String> = incoming
            .iter()
            .filter_map(|r| r.key("id").map(str::to_string))
            .collect();
        prop_assert_eq!(task_ids(&db), expected.clone());
        for task in &incoming {
            let id = task.key("id").unwrap();
            let stored = db.get(stores::TASKS, id).unwrap();
            prop_assert_eq!(stored.as_ref(), Some(task));
        }

        let still_buried: BTreeSet<String> = buried.difference(&expected).cloned().collect();
        prop_assert_eq!(buried_ids(&db), still_buried);
    }

    #[test]
    fn soft_delete_moves_records_into_tombstones(
        tasks in tasks_strategy(10),
        mask in prop::collection::vec(any::<bool>(), 10),
    ) {
        let rt = runtime();
        let db = Database::open_in_memory().unwrap();
        put_all(&db, &tasks);

        let deleted: Vec<&str> = tasks
            .iter()
            .zip(&mask)
            .filter(|(_, delete)| **delete)
            .filter_map(|(t, _)| t.key("id"))
            .collect();
        for id in &deleted {
            prop_assert!(rt.block_on(db.tombstones().soft_delete(stores::TASKS, id)).unwrap());
        }

        for task in &tasks {
            let id = task.key("id").unwrap();
            let live = db.get(stores::TASKS, id).unwrap().is_some();
            let buried = db.tombstones().get(stores::TASKS, id).unwrap().is_some();
            prop_assert!(live != buried);
        }

        let purged = rt.block_on(db.tombstones().purge_older_than(0)).unwrap();
        prop_assert_eq!(purged, deleted.len());
        prop_assert_eq!(rt.block_on(db.tombstones().purge_older_than(0)).unwrap(), 0);
    }

    #[test]
    fn invalid_store_shape_never_writes(value in non_array_strategy()) {
        let rt = runtime();
        let db = Database::open_in_memory().unwrap();
        seed_tasks(&db, 2);
        let seq = db.committed_seq();

        let bundle = serde_json::json!({
            "_meta": { "app": boris_core::APP_ID, "version": 6 },
            "stores": { "tasks": value },
        });
        let result = rt.block_on(db.backups().import_bundle(&bundle, ImportOptions::replace()));
        prop_assert!(result.is_err());
        prop_assert_eq!(db.committed_seq(), seq);
        prop_assert_eq!(db.count(stores::TASKS).unwrap(), 2);
    }
}
