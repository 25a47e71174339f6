//! Export, import and validate commands.

use boris_core::backup::{read_bundle_file, validate_bundle, write_bundle_file, BundleExpectations};
use boris_core::{BundleReport, Database, ImportOptions, Schema, APP_ID};
use std::path::{Path, PathBuf};
use tracing::info;

/// Expectations used when validating without a database.
pub fn default_expectations() -> BundleExpectations {
    BundleExpectations::from_schema(&Schema::boris(), APP_ID)
}

/// Writes a backup bundle.
///
/// With no `out`, the bundle goes to the database's `backups` directory
/// under the default dated file name. An existing directory is treated the
/// same way; anything else is used as the file path and must end in `.json`.
pub fn export(db: &Database, out: Option<&Path>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let path = match out {
        Some(out) if !out.is_dir() => {
            if !has_json_extension(out) {
                return Err(format!(
                    "Backup file must end in .json so it can be imported: {}",
                    out.display()
                )
                .into());
            }
            let bundle = db.backups().export_bundle()?;
            write_bundle_file(out, &bundle)?;
            out.to_path_buf()
        }
        Some(dir) => db.backups().export_to_dir(dir)?,
        None => {
            let dir = db
                .dir()
                .map(|d| d.backups_dir())
                .ok_or("Database has no directory to export into; pass --out")?;
            db.backups().export_to_dir(&dir)?
        }
    };

    let health = db.health_metrics()?;
    println!("✓ Backup exported");
    println!("  Path: {}", path.display());
    println!("  Collections: {}", health.counts.len());
    println!("  Records: {}", health.total_records);

    Ok(path)
}

/// Imports a backup bundle, replacing or merging.
pub async fn import(
    db: &Database,
    file: &Path,
    merge: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    info!(file = %file.display(), merge, "importing backup");

    let bundle = read_bundle_file(file)?;
    let report = db.backups().validate_bundle(&bundle);
    if !report.valid {
        print_report(&report);
        return Err("Backup validation failed; nothing was imported".into());
    }

    let options = if merge {
        ImportOptions::merge()
    } else {
        ImportOptions::replace()
    };
    let summary = db.backups().import_bundle(&bundle, options).await?;

    println!(
        "✓ Backup {}",
        if merge { "merged" } else { "restored" }
    );
    println!("  Records imported: {}", summary.imported);
    println!("  Collections: {}", summary.stores.len());
    if summary.skipped > 0 {
        println!("  Skipped (no key): {}", summary.skipped);
    }
    for name in &summary.unknown_stores {
        println!("  Ignored unknown collection: {name}");
    }
    if summary.tombstones_cleared > 0 {
        println!("  Tombstones cleared: {}", summary.tombstones_cleared);
    }
    for warning in &summary.warnings {
        println!("  Warning: {warning}");
    }

    Ok(())
}

/// Validates a backup file without importing it.
pub fn validate(
    expected: &BundleExpectations,
    file: &Path,
) -> Result<BundleReport, Box<dyn std::error::Error>> {
    info!(file = %file.display(), "validating backup");

    let bundle = read_bundle_file(file)?;
    let report = validate_bundle(&bundle, expected);
    print_report(&report);

    if report.valid {
        Ok(report)
    } else {
        Err("Backup validation failed".into())
    }
}

fn has_json_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn print_report(report: &BundleReport) {
    if report.valid {
        println!("✓ Backup is valid");
    } else {
        println!("✗ Backup is invalid");
    }

    if let Some(meta) = &report.meta {
        println!("  App: {}", meta.app);
        println!("  Version: {}", meta.version);
        if !meta.exported_at.is_empty() {
            println!("  Exported: {}", meta.exported_at);
        }
        println!("  Collections: {}", meta.store_count);
    }
    for error in &report.errors {
        println!("  Error: {error}");
    }
    for warning in &report.warnings {
        println!("  Warning: {warning}");
    }
}
