//! Write guard behavior through the database.

use boris_core::schema::stores;
use boris_core::{CoreError, CoreResult, Database, ImportOptions, Record};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

type Log = Arc<Mutex<Vec<String>>>;

fn task(id: &str) -> Record {
    Record::from_value(json!({ "id": id, "title": format!("task {id}"), "status": "open" }))
        .unwrap()
}

struct HeldWrite {
    started: oneshot::Receiver<()>,
    finish: oneshot::Sender<()>,
    handle: JoinHandle<CoreResult<String>>,
}

/// Starts a write that stays in flight until `finish` is signalled.
fn held_write(db: &Arc<Database>, id: &'static str, log: &Log) -> HeldWrite {
    let (started_tx, started) = oneshot::channel();
    let (finish, finish_rx) = oneshot::channel::<()>();
    let db = Arc::clone(db);
    let log = Arc::clone(log);

    let handle = tokio::spawn(async move {
        let inner = Arc::clone(&db);
        db.run_write(move || async move {
            let _ = started_tx.send(());
            let _ = finish_rx.await;
            log.lock().push(format!("write {id}"));
            inner.put(stores::TASKS, task(id))
        })
        .await
    });

    HeldWrite {
        started,
        finish,
        handle,
    }
}

#[tokio::test]
async fn acquire_resolves_after_both_in_flight_writes() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let log: Log = Arc::default();

    let first = held_write(&db, "a", &log);
    let second = held_write(&db, "b", &log);
    first.started.await.unwrap();
    second.started.await.unwrap();
    assert_eq!(db.guard().active_writes(), 2);

    let acquirer = {
        let db = Arc::clone(&db);
        let log = Arc::clone(&log);
        tokio::spawn(async move {
            db.guard().acquire().await?;
            log.lock().push("acquired".into());
            Ok::<_, CoreError>(())
        })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(db.guard().is_enabled());
    assert!(!acquirer.is_finished());

    first.finish.send(()).unwrap();
    first.handle.await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!acquirer.is_finished());

    second.finish.send(()).unwrap();
    second.handle.await.unwrap().unwrap();
    acquirer.await.unwrap().unwrap();

    assert_eq!(*log.lock(), vec!["write a", "write b", "acquired"]);
    assert_eq!(db.count(stores::TASKS).unwrap(), 2);
    db.guard().release();
}

#[tokio::test]
async fn no_write_starts_while_guard_is_held() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let log: Log = Arc::default();

    let exclusive = db.guard().exclusive().await.unwrap();

    let late = {
        let db = Arc::clone(&db);
        let log = Arc::clone(&log);
        tokio::spawn(async move {
            let inner = Arc::clone(&db);
            db.run_write(move || async move {
                log.lock().push("late".into());
                inner.put(stores::TASKS, task("late"))
            })
            .await
        })
    };

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(log.lock().is_empty());
    assert_eq!(db.guard().active_writes(), 0);
    assert!(!late.is_finished());

    drop(exclusive);
    late.await.unwrap().unwrap();
    assert_eq!(*log.lock(), vec!["late"]);
    assert!(db.get(stores::TASKS, "late").unwrap().is_some());
}

#[tokio::test]
async fn soft_delete_waits_for_replace_import() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    db.put(stores::TASKS, task("keep")).unwrap();

    let exclusive = db.guard().exclusive().await.unwrap();
    let deleter = {
        let db = Arc::clone(&db);
        tokio::spawn(async move { db.tombstones().soft_delete(stores::TASKS, "keep").await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!deleter.is_finished());
    assert!(db.get(stores::TASKS, "keep").unwrap().is_some());

    drop(exclusive);
    assert!(deleter.await.unwrap().unwrap());
    assert!(db.get(stores::TASKS, "keep").unwrap().is_none());
}

#[tokio::test]
async fn failing_write_does_not_wedge_the_guard() {
    let db = Database::open_in_memory().unwrap();

    let result = db
        .run_write(|| async { db.put("no_such_store", task("x")) })
        .await;
    assert!(result.is_err());
    assert_eq!(db.guard().active_writes(), 0);

    let summary = db
        .backups()
        .import_bundle(
            &serde_json::to_value(db.backups().export_bundle().unwrap()).unwrap(),
            ImportOptions::replace(),
        )
        .await
        .unwrap();
    assert_eq!(summary.imported, 0);
    assert!(!db.guard().is_enabled());
}
