//! Reading and writing bundle files.

use super::bundle::Bundle;
use crate::error::{CoreError, CoreResult};
use boris_storage::{FileBackend, StorageBackend};
use chrono::NaiveDate;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Returns the default file name for a backup taken on `date`.
///
/// ```rust
/// use boris_core::backup::suggested_file_name;
/// use chrono::NaiveDate;
///
/// let date = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
/// assert_eq!(suggested_file_name(date), "boris-backup-2026-10-18.json");
/// ```
#[must_use]
pub fn suggested_file_name(date: NaiveDate) -> String {
    format!("boris-backup-{}.json", date.format("%Y-%m-%d"))
}

/// Reads a bundle file chosen by the user.
///
/// # Errors
///
/// - `WrongFileType` if the name does not end in `.json`, or the document
///   is not an object with `_meta` or `stores`
/// - `MalformedFile` if the content is not JSON
/// - `Io` if the file cannot be read
pub fn read_bundle_file(path: &Path) -> CoreResult<Value> {
    ensure_json_name(path)?;

    let bytes = fs::read(path)?;
    let value: Value =
        serde_json::from_slice(&bytes).map_err(|e| CoreError::malformed_file(e.to_string()))?;

    match &value {
        Value::Object(root) if root.contains_key("_meta") || root.contains_key("stores") => {
            debug!(path = %path.display(), bytes = bytes.len(), "bundle file read");
            Ok(value)
        }
        _ => Err(CoreError::wrong_file_type(path.display().to_string())),
    }
}

/// Writes a bundle as compact JSON, replacing any existing file atomically.
///
/// # Errors
///
/// - `WrongFileType` if the name does not end in `.json`
/// - `Storage` or `Io` if the file cannot be written
pub fn write_bundle_file(path: &Path, bundle: &Bundle) -> CoreResult<u64> {
    ensure_json_name(path)?;
    let bytes = bundle.to_json()?;
    let mut backend = FileBackend::open_with_create_dirs(path)?;
    backend.replace(&bytes)?;
    debug!(path = %path.display(), bytes = bytes.len(), "bundle file written");
    Ok(bytes.len() as u64)
}

/// Bundle files carry a `.json` extension, in any case.
fn ensure_json_name(path: &Path) -> CoreResult<()> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        Ok(())
    } else {
        Err(CoreError::wrong_file_type(path.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::BundleMeta;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    #[test]
    fn rejects_non_json_extension() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("backup.txt");
        fs::write(&path, b"{}").unwrap();

        assert!(matches!(
            read_bundle_file(&path),
            Err(CoreError::WrongFileType { .. })
        ));
    }

    #[test]
    fn rejects_malformed_json() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("backup.json");
        fs::write(&path, b"{ \"_meta\": ").unwrap();

        assert!(matches!(
            read_bundle_file(&path),
            Err(CoreError::MalformedFile { .. })
        ));
    }

    #[test]
    fn rejects_unrelated_json() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("package.json");
        fs::write(&path, br#"{ "name": "something-else" }"#).unwrap();
        assert!(matches!(
            read_bundle_file(&path),
            Err(CoreError::WrongFileType { .. })
        ));

        fs::write(&path, b"[1, 2, 3]").unwrap();
        assert!(matches!(
            read_bundle_file(&path),
            Err(CoreError::WrongFileType { .. })
        ));
    }

    #[test]
    fn accepts_uppercase_extension() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("BACKUP.JSON");
        fs::write(&path, br#"{ "stores": {} }"#).unwrap();
        assert!(read_bundle_file(&path).is_ok());
    }

    #[test]
    fn write_then_read() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested").join("boris-backup-2026-10-18.json");
        let bundle = Bundle {
            meta: BundleMeta {
                app: "boris-os".into(),
                version: 6,
                exported_at: "2026-10-18T00:00:00.000Z".into(),
                store_count: 0,
                record_counts: BTreeMap::new(),
            },
            stores: BTreeMap::new(),
        };

        let written = write_bundle_file(&path, &bundle).unwrap();
        assert_eq!(written, fs::metadata(&path).unwrap().len());

        let raw = fs::read_to_string(&path).unwrap();
        assert!(!raw.contains('\n'));

        let value = read_bundle_file(&path).unwrap();
        assert_eq!(value["_meta"]["app"], "boris-os");
    }

    fn empty_bundle() -> Bundle {
        Bundle {
            meta: BundleMeta {
                app: "boris-os".into(),
                version: 6,
                exported_at: "2026-10-18T00:00:00.000Z".into(),
                store_count: 0,
                record_counts: BTreeMap::new(),
            },
            stores: BTreeMap::new(),
        }
    }

    #[test]
    fn write_refuses_non_json_name() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("backup.txt");

        assert!(matches!(
            write_bundle_file(&path, &empty_bundle()),
            Err(CoreError::WrongFileType { .. })
        ));
        assert!(!path.exists());
    }

    #[test]
    fn write_keeps_unrelated_tmp_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("notes.json");
        let notes = temp.path().join("notes.tmp");
        fs::write(&notes, b"draft").unwrap();

        write_bundle_file(&path, &empty_bundle()).unwrap();

        assert_eq!(fs::read(&notes).unwrap(), b"draft");
        assert!(read_bundle_file(&path).is_ok());
    }
}
