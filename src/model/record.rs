//! Record model.
//!
//! A record is one flat row pulled from a source API: named fields mapped to
//! scalar values. Schemas differ per source, but every record that reaches
//! the warehouse carries a `date` field, which doubles as the sync watermark.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Name of the field every synced record is partitioned by.
pub const DATE_FIELD: &str = "date";

/// A scalar field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Convert a JSON scalar into a `Value`.
    ///
    /// Arrays and objects are not scalars and are rejected.
    pub fn from_json(field: &str, value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Null => Ok(Self::Null),
            serde_json::Value::Bool(b) => Ok(Self::Int(i64::from(*b))),
            serde_json::Value::Number(n) => Ok(n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::Null)),
            serde_json::Value::String(s) => Ok(Self::Text(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => Err(
                Error::InvalidRecord(format!("field '{field}' is not a scalar value")),
            ),
        }
    }

    /// True for `Null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// A flat, ordered mapping of field names to scalar values.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from a JSON object, keeping only `allowed` fields.
    ///
    /// Fields absent from the object are simply not set; the table schema
    /// decides their defaults later.
    pub fn from_json_object(
        object: &serde_json::Map<String, serde_json::Value>,
        allowed: &[&str],
    ) -> Result<Self> {
        let mut record = Self::new();
        for &field in allowed {
            if let Some(value) = object.get(field) {
                record.set(field, Value::from_json(field, value)?);
            }
        }
        Ok(record)
    }

    /// Set a field, replacing any previous value.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    /// Builder form of [`Record::set`].
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: Value) -> Self {
        self.set(field, value);
        self
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Copy every field of `other` into this record, overwriting collisions.
    pub fn merge(&mut self, other: &Self) {
        for (k, v) in &other.fields {
            self.fields.insert(k.clone(), v.clone());
        }
    }

    /// The record's partition date, if it carries a parseable one.
    #[must_use]
    pub fn date(&self) -> Option<NaiveDate> {
        match self.fields.get(DATE_FIELD)? {
            Value::Date(d) => Some(*d),
            Value::Timestamp(ts) => Some(ts.date()),
            Value::Text(s) => super::table::parse_date(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_object_drops_unknown_fields() {
        let obj = json!({"id": 7, "name": "Spring", "secret": "x"});
        let record = Record::from_json_object(obj.as_object().unwrap(), &["id", "name"]).unwrap();

        assert_eq!(record.len(), 2);
        assert_eq!(record.get("id"), Some(&Value::Int(7)));
        assert_eq!(record.get("name"), Some(&Value::Text("Spring".into())));
        assert!(record.get("secret").is_none());
    }

    #[test]
    fn test_nested_values_rejected() {
        let obj = json!({"id": [1, 2]});
        let err = Record::from_json_object(obj.as_object().unwrap(), &["id"]).unwrap_err();
        assert!(err.to_string().contains("'id'"));
    }

    #[test]
    fn test_merge_overwrites() {
        let mut stats = Record::new()
            .with("date", Value::Text("2024-03-01".into()))
            .with("id", Value::Int(1));
        let campaign = Record::new().with("id", Value::Int(99)).with("name", Value::Text("c".into()));
        stats.merge(&campaign);

        assert_eq!(stats.get("id"), Some(&Value::Int(99)));
        assert_eq!(stats.len(), 3);
    }

    #[test]
    fn test_date_accessor_parses_text() {
        let record = Record::new().with("date", Value::Text("2024-03-01 00:00:00".into()));
        assert_eq!(record.date(), NaiveDate::from_ymd_opt(2024, 3, 1));

        let record = Record::new().with("date", Value::Int(5));
        assert_eq!(record.date(), None);
    }
}
