//! Secondary indexes over record fields.
//!
//! Every collection may declare non-unique indexes mapping a field value to
//! the set of record keys holding it. Indexes are derived state: they are
//! rebuilt from the records when a database is opened and maintained on
//! every put/delete, never persisted.
//!
//! Only numbers and strings are indexable. Numbers order before strings,
//! and records whose field is missing, null, a boolean, an array or an
//! object are simply absent from the index.

use crate::record::Record;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

/// An indexable field value.
#[derive(Debug, Clone)]
pub enum IndexKey {
    /// A numeric value.
    Number(f64),
    /// A string value.
    Text(String),
}

impl IndexKey {
    /// Converts a JSON value into an index key, if it is indexable.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64().map(Self::Number),
            Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }
}

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexKey {}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Number(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Number(_)) => Ordering::Greater,
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
        }
    }
}

/// A non-unique ordered index over one record field.
#[derive(Debug, Clone)]
pub struct FieldIndex {
    /// Indexed field.
    field: String,
    /// Ordered key to record keys mapping.
    entries: BTreeMap<IndexKey, BTreeSet<String>>,
    /// Total entry count.
    count: usize,
}

impl FieldIndex {
    /// Creates an empty index over `field`.
    #[must_use]
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            entries: BTreeMap::new(),
            count: 0,
        }
    }

    /// Returns the indexed field name.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Adds a record under its current field value.
    pub fn insert(&mut self, record_key: &str, record: &Record) {
        let Some(key) = record.get(&self.field).and_then(IndexKey::from_value) else {
            return;
        };
        if self
            .entries
            .entry(key)
            .or_default()
            .insert(record_key.to_string())
        {
            self.count += 1;
        }
    }

    /// Removes a record from the entry for its field value.
    pub fn remove(&mut self, record_key: &str, record: &Record) {
        let Some(key) = record.get(&self.field).and_then(IndexKey::from_value) else {
            return;
        };
        if let Some(set) = self.entries.get_mut(&key) {
            if set.remove(record_key) {
                self.count -= 1;
            }
            if set.is_empty() {
                self.entries.remove(&key);
            }
        }
    }

    /// Returns the record keys whose field equals `key`.
    #[must_use]
    pub fn lookup(&self, key: &IndexKey) -> Vec<String> {
        self.entries
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the record keys whose field falls in the range, in index order.
    ///
    /// An inverted range yields nothing.
    #[must_use]
    pub fn range(&self, lower: Bound<IndexKey>, upper: Bound<IndexKey>) -> Vec<String> {
        if let (
            Bound::Included(lo) | Bound::Excluded(lo),
            Bound::Included(hi) | Bound::Excluded(hi),
        ) = (&lower, &upper)
        {
            let empty = match (&lower, &upper) {
                (Bound::Included(_), Bound::Included(_)) => lo > hi,
                _ => lo >= hi,
            };
            if empty {
                return Vec::new();
            }
        }

        self.entries
            .range((lower, upper))
            .flat_map(|(_, keys)| keys.iter().cloned())
            .collect()
    }

    /// Returns the number of indexed records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if no record is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.count = 0;
    }

    /// Rebuilds the index from a set of records.
    pub fn rebuild<'a, I>(&mut self, records: I)
    where
        I: IntoIterator<Item = (&'a String, &'a Record)>,
    {
        self.clear();
        for (key, record) in records {
            self.insert(key, record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(value: Value) -> Record {
        Record::from_value(value).unwrap()
    }

    fn text(s: &str) -> IndexKey {
        IndexKey::Text(s.to_string())
    }

    #[test]
    fn numbers_sort_before_strings() {
        let mut keys = vec![text("a"), IndexKey::Number(10.0), text("0"), IndexKey::Number(-1.5)];
        keys.sort();
        assert_eq!(
            keys,
            vec![IndexKey::Number(-1.5), IndexKey::Number(10.0), text("0"), text("a")]
        );
    }

    #[test]
    fn unindexable_values_are_skipped() {
        assert!(IndexKey::from_value(&json!(true)).is_none());
        assert!(IndexKey::from_value(&json!(null)).is_none());
        assert!(IndexKey::from_value(&json!([1])).is_none());

        let mut index = FieldIndex::new("status");
        index.insert("a", &rec(json!({"status": false})));
        index.insert("b", &rec(json!({})));
        assert!(index.is_empty());
    }

    #[test]
    fn equality_lookup_is_non_unique() {
        let mut index = FieldIndex::new("status");
        index.insert("a", &rec(json!({"status": "open"})));
        index.insert("b", &rec(json!({"status": "open"})));
        index.insert("c", &rec(json!({"status": "done"})));

        assert_eq!(index.lookup(&text("open")), vec!["a", "b"]);
        assert_eq!(index.lookup(&text("done")), vec!["c"]);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn remove_drops_empty_entries() {
        let mut index = FieldIndex::new("status");
        let open = rec(json!({"status": "open"}));
        index.insert("a", &open);
        index.remove("a", &open);

        assert!(index.lookup(&text("open")).is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn range_with_open_bounds() {
        let mut index = FieldIndex::new("date");
        for (key, date) in [("a", "2026-01-01"), ("b", "2026-02-01"), ("c", "2026-03-01")] {
            index.insert(key, &rec(json!({"date": date})));
        }

        let from_feb = index.range(Bound::Included(text("2026-02-01")), Bound::Unbounded);
        assert_eq!(from_feb, vec!["b", "c"]);

        let until_feb = index.range(Bound::Unbounded, Bound::Included(text("2026-02-01")));
        assert_eq!(until_feb, vec!["a", "b"]);

        let all = index.range(Bound::Unbounded, Bound::Unbounded);
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn inverted_range_is_empty() {
        let mut index = FieldIndex::new("n");
        index.insert("a", &rec(json!({"n": 5})));

        let none = index.range(
            Bound::Included(IndexKey::Number(9.0)),
            Bound::Included(IndexKey::Number(1.0)),
        );
        assert!(none.is_empty());
    }
}
