//! Dynamic records stored in collections.

use crate::error::{CoreError, CoreResult};
use crate::types::{iso_timestamp, parse_timestamp};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field set on every mutation.
pub const UPDATED_AT: &str = "updated_at";
/// Camel-case spelling of [`UPDATED_AT`] found in older records.
pub const UPDATED_AT_CAMEL: &str = "updatedAt";

/// A single record: a JSON object keyed by its collection's key path.
///
/// Records are schemaless beyond their key. The gateway checks the key at
/// the boundary (see [`Record::require_key`]); everything else is the entity
/// store's business.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Converts a JSON value into a record.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the value is not an object.
    pub fn from_value(value: Value) -> CoreResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(CoreError::validation(format!(
                "record must be an object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Returns the record key at `key_path`, if it is a non-empty string.
    #[must_use]
    pub fn key(&self, key_path: &str) -> Option<&str> {
        match self.0.get(key_path) {
            Some(Value::String(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    /// Returns the record key at `key_path` or a validation error.
    pub fn require_key(&self, store: &str, key_path: &str) -> CoreResult<&str> {
        self.key(key_path).ok_or_else(|| {
            CoreError::validation(format!(
                "record in {store} has no string `{key_path}` field"
            ))
        })
    }

    /// Returns a field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Returns a string field.
    #[must_use]
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    /// Sets a field, returning the previous value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    /// Removes a field, returning its value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    /// Returns when the record was last mutated.
    #[must_use]
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.get_str(UPDATED_AT)
            .or_else(|| self.get_str(UPDATED_AT_CAMEL))
            .and_then(parse_timestamp)
    }

    /// Stamps the record as mutated at `now`.
    ///
    /// Records that only carry the camel-case field keep that spelling.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        let field = if !self.0.contains_key(UPDATED_AT) && self.0.contains_key(UPDATED_AT_CAMEL) {
            UPDATED_AT_CAMEL
        } else {
            UPDATED_AT
        };
        self.0.insert(field.to_string(), Value::String(iso_timestamp(now)));
    }

    /// Returns the underlying field map.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the record into a JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Returns the compact serialized size in bytes.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        serde_json::to_vec(&self.0).map_or(0, |bytes| bytes.len())
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        record.into_value()
    }
}

/// Names a JSON value's type for error messages.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
