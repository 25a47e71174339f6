//! Tombstone commands: list, restore and purge.

use boris_core::Database;

/// Lists tombstones, newest first.
pub fn list(db: &Database, store: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let tombstones = db.tombstones().list(store)?;
    if tombstones.is_empty() {
        println!("No tombstones");
        return Ok(());
    }

    println!("{:<12} {:<38} {:<26} UNDO", "STORE", "ID", "DELETED");
    for tombstone in &tombstones {
        println!(
            "{:<12} {:<38} {:<26} {}",
            tombstone.store,
            tombstone.id,
            tombstone.deleted_at,
            if tombstone.has_snapshot() { "yes" } else { "no" }
        );
    }
    println!();
    println!("{} tombstone(s)", tombstones.len());

    Ok(())
}

/// Undoes a soft delete.
pub async fn restore(
    db: &Database,
    store: &str,
    id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    match db.tombstones().restore_from_tombstone(store, id).await? {
        Some(_) => {
            println!("✓ Restored {store}/{id}");
            Ok(())
        }
        None => Err(format!("No restorable tombstone for {store}/{id}").into()),
    }
}

/// Drops tombstones older than `days`, or the configured retention window.
pub async fn purge(db: &Database, days: Option<u32>) -> Result<(), Box<dyn std::error::Error>> {
    let days = days.unwrap_or(db.config().tombstone_retention_days);
    let purged = db.tombstones().purge_older_than(days).await?;
    println!("✓ Purged {purged} tombstone(s) older than {days} day(s)");
    Ok(())
}
