//! Bundle validation.
//!
//! [`validate_bundle`] is pure: it inspects a parsed JSON value against a
//! [`BundleExpectations`] and never touches a database.

use super::bundle::BundleMeta;
use crate::record::json_kind;
use crate::schema::{Schema, SchemaVersion};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// What a bundle is checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleExpectations {
    /// Required `_meta.app`.
    pub app_id: String,
    /// Schema version of the importing database.
    pub schema_version: SchemaVersion,
    /// Known collections and their key paths.
    pub key_paths: BTreeMap<String, String>,
}

impl BundleExpectations {
    /// Builds expectations from a schema at its current version.
    #[must_use]
    pub fn from_schema(schema: &Schema, app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            schema_version: schema.current_version(),
            key_paths: schema
                .collections()
                .into_iter()
                .map(|c| (c.name, c.key_path))
                .collect(),
        }
    }
}

/// Result of validating a bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleReport {
    /// True if there are no errors. Warnings do not block an import.
    pub valid: bool,
    /// Problems that make the bundle unusable.
    pub errors: Vec<String>,
    /// Problems an import works around.
    pub warnings: Vec<String>,
    /// The parsed header, when readable.
    pub meta: Option<BundleMeta>,
}

/// Validates a bundle.
///
/// Errors:
/// - `_meta` missing or not an object
/// - `_meta.app` missing, not a string, or not the expected product
/// - `stores` missing or not an object, or a store that is not an array
///
/// Warnings:
/// - bundle version newer than the schema
/// - records lacking their collection's key (skipped on import)
/// - unknown collections (skipped on import)
/// - record counts disagreeing with `_meta.recordCounts`
/// - no records at all
#[must_use]
pub fn validate_bundle(bundle: &Value, expected: &BundleExpectations) -> BundleReport {
    let mut report = BundleReport::default();

    let Some(root) = bundle.as_object() else {
        report
            .errors
            .push(format!("backup must be a JSON object, got {}", json_kind(bundle)));
        return report;
    };

    let meta = check_meta(root, expected, &mut report);
    check_stores(root, expected, meta.as_ref(), &mut report);

    report.meta = meta;
    report.valid = report.errors.is_empty();
    report
}

fn check_meta(
    root: &Map<String, Value>,
    expected: &BundleExpectations,
    report: &mut BundleReport,
) -> Option<BundleMeta> {
    let meta = match root.get("_meta") {
        None => {
            report.errors.push("_meta is missing".to_string());
            return None;
        }
        Some(Value::Object(meta)) => meta,
        Some(other) => {
            report
                .errors
                .push(format!("_meta must be an object, got {}", json_kind(other)));
            return None;
        }
    };

    match meta.get("app") {
        None => report.errors.push("_meta.app is missing".to_string()),
        Some(Value::String(app)) if *app != expected.app_id => {
            report.errors.push(format!("unknown app: {app}"));
        }
        Some(Value::String(_)) => {}
        Some(other) => report
            .errors
            .push(format!("_meta.app must be a string, got {}", json_kind(other))),
    }

    match meta.get("version") {
        None => {}
        Some(Value::Number(n)) => match n.as_u64() {
            Some(version) if version > u64::from(expected.schema_version) => {
                report.warnings.push(format!(
                    "backup is from a newer version (v{version}, this app is v{}); unknown data may be ignored",
                    expected.schema_version
                ));
            }
            Some(_) => {}
            None => report
                .warnings
                .push("_meta.version is not a valid version number".to_string()),
        },
        Some(_) => report
            .warnings
            .push("_meta.version is not a valid version number".to_string()),
    }

    serde_json::from_value(Value::Object(meta.clone())).ok()
}

fn check_stores(
    root: &Map<String, Value>,
    expected: &BundleExpectations,
    meta: Option<&BundleMeta>,
    report: &mut BundleReport,
) {
    let stores = match root.get("stores") {
        None => {
            report.errors.push("stores is missing".to_string());
            return;
        }
        Some(Value::Object(stores)) => stores,
        Some(other) => {
            report
                .errors
                .push(format!("stores must be an object, got {}", json_kind(other)));
            return;
        }
    };

    let mut total = 0usize;
    for (name, value) in stores {
        let Some(records) = value.as_array() else {
            report.errors.push(format!(
                "stores.{name} must be an array, got {}",
                json_kind(value)
            ));
            continue;
        };

        if let Some(claimed) = meta.and_then(|m| m.record_counts.get(name)) {
            if *claimed != records.len() {
                report.warnings.push(format!(
                    "_meta.recordCounts.{name} is {claimed} but {} records were found",
                    records.len()
                ));
            }
        }

        let Some(key_path) = expected.key_paths.get(name) else {
            report
                .warnings
                .push(format!("unknown store {name} will be skipped"));
            continue;
        };

        total += records.len();
        let keyless = records
            .iter()
            .filter(|r| !has_key(r, key_path))
            .count();
        if keyless > 0 {
            report.warnings.push(format!(
                "{keyless} record(s) in {name} have no `{key_path}` and will be skipped"
            ));
        }
    }

    if total == 0 && report.errors.is_empty() {
        report.warnings.push("empty backup".to_string());
    }
}

/// Returns true if a bundle record carries a usable key.
pub(crate) fn has_key(record: &Value, key_path: &str) -> bool {
    matches!(record.get(key_path), Some(Value::String(s)) if !s.is_empty())
}
