//! Property-based test generators using proptest.
//!
//! Provides strategies for generating records and bundles that keep the
//! invariants the database relies on (keys present, unique per collection).

use boris_core::schema::stores;
use boris_core::{Record, APP_ID};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Strategy for generating record ids.
pub fn record_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9]{1,12}").expect("Invalid regex")
}

/// Strategy for generating ISO-8601 timestamps in 2020..2030.
pub fn timestamp_strategy() -> impl Strategy<Value = String> {
    (2020u32..2030, 1u32..=12, 1u32..=28, 0u32..24, 0u32..60).prop_map(
        |(year, month, day, hour, minute)| {
            format!("{year}-{month:02}-{day:02}T{hour:02}:{minute:02}:00.000Z")
        },
    )
}

/// Strategy for generating a task with the given id.
pub fn task_strategy(id: String) -> impl Strategy<Value = Record> {
    (
        prop::string::string_regex("[A-Za-z ]{0,24}").expect("Invalid regex"),
        prop_oneof![Just("open"), Just("done"), Just("waiting")],
        prop::option::of(0u32..5),
        timestamp_strategy(),
    )
        .prop_map(move |(title, status, priority, updated_at)| {
            let mut value = json!({
                "id": id.clone(),
                "title": title,
                "status": status,
                "updated_at": updated_at,
            });
            if let Some(priority) = priority {
                value["priority"] = json!(priority);
            }
            Record::from_value(value).expect("task is an object")
        })
}

/// Strategy for generating tasks with unique ids.
pub fn tasks_strategy(max: usize) -> impl Strategy<Value = Vec<Record>> {
    prop::collection::btree_set(record_id_strategy(), 0..=max).prop_flat_map(|ids| {
        ids.into_iter()
            .map(task_strategy)
            .collect::<Vec<_>>()
    })
}

/// Builds a bundle holding `tasks`, shaped like an export.
pub fn bundle_with_tasks(tasks: &[Record]) -> Value {
    let records: Vec<Value> = tasks.iter().cloned().map(Record::into_value).collect();
    let counts = BTreeMap::from([(stores::TASKS, records.len())]);
    let stores_map = BTreeMap::from([(stores::TASKS, records)]);
    json!({
        "_meta": {
            "app": APP_ID,
            "version": 6,
            "exportedAt": "2026-10-18T00:00:00.000Z",
            "storeCount": 1,
            "recordCounts": counts,
        },
        "stores": stores_map,
    })
}

/// Strategy for generating valid single-collection bundles.
pub fn bundle_strategy(max_tasks: usize) -> impl Strategy<Value = Value> {
    tasks_strategy(max_tasks).prop_map(|tasks| bundle_with_tasks(&tasks))
}

/// Strategy for generating JSON values that are not arrays.
pub fn non_array_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-z]{0,8}".prop_map(Value::String),
        Just(json!({ "id": "x" })),
    ]
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boris_core::parse_timestamp;
    use std::collections::BTreeSet;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn timestamps_parse(raw in timestamp_strategy()) {
            prop_assert!(parse_timestamp(&raw).is_some());
        }

        #[test]
        fn task_ids_are_unique(tasks in tasks_strategy(16)) {
            let ids: BTreeSet<_> = tasks.iter().filter_map(|t| t.key("id")).collect();
            prop_assert_eq!(ids.len(), tasks.len());
        }

        #[test]
        fn bundle_counts_match(bundle in bundle_strategy(8)) {
            let len = bundle["stores"][stores::TASKS].as_array().map_or(0, Vec::len);
            prop_assert_eq!(bundle["_meta"]["recordCounts"][stores::TASKS].as_u64(), Some(len as u64));
        }
    }
}
