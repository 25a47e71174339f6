//! Health command implementation.

use boris_core::Database;

/// Prints record counts and the export size estimate.
pub fn run(db: &Database, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let health = db.health_metrics()?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&health)?);
        return Ok(());
    }

    println!("Database Health");
    println!("===============");
    if let Some(path) = db.path() {
        println!("  Path: {}", path.display());
    }
    println!("  Schema version: {}", health.schema_version);
    println!("  Records: {}", health.live_records());
    println!("  Tombstones: {}", health.tombstones);
    println!(
        "  Estimated export: {}",
        format_bytes(health.estimated_export_bytes)
    );
    println!();
    println!("Collections:");
    for (name, count) in &health.counts {
        println!("  {name:<12} {count:>8}");
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KIB {
        format!("{bytes} B")
    } else if b < KIB * KIB {
        format!("{:.1} KiB", b / KIB)
    } else {
        format!("{:.1} MiB", b / (KIB * KIB))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MiB");
    }
}
