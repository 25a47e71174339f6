//! Backup bundle types.

use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The `_meta` header of a bundle.
///
/// Only `app` is required when reading; the other fields default when
/// absent so bundles from older exporters still parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleMeta {
    /// Product identifier.
    pub app: String,
    /// Schema version of the exporting database.
    #[serde(default)]
    pub version: u32,
    /// Export time (ISO-8601).
    #[serde(default)]
    pub exported_at: String,
    /// Number of collections in the bundle.
    #[serde(default)]
    pub store_count: usize,
    /// Records per collection at export time.
    #[serde(default)]
    pub record_counts: BTreeMap<String, usize>,
}

/// A portable backup of every collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    /// Header.
    #[serde(rename = "_meta")]
    pub meta: BundleMeta,
    /// Records per collection.
    pub stores: BTreeMap<String, Vec<Record>>,
}

impl Bundle {
    /// Returns the number of records across collections.
    #[must_use]
    pub fn total_records(&self) -> usize {
        self.stores.values().map(Vec::len).sum()
    }

    /// Serializes the bundle to compact JSON.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
