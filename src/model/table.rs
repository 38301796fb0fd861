//! Tabular shape of a destination table.
//!
//! Sources emit loosely typed [`Record`]s; a [`TableSchema`] reshapes them
//! into typed rows: unknown fields dropped, numerics defaulted to zero, date
//! strings parsed.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::record::{DATE_FIELD, Record, Value};
use crate::error::{Error, Result};

/// Fully-qualified destination table name (`dataset.table`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableRef {
    dataset: Option<String>,
    table: String,
}

impl TableRef {
    #[must_use]
    pub fn new(dataset: Option<&str>, table: &str) -> Self {
        Self {
            dataset: dataset.map(str::to_string),
            table: table.to_string(),
        }
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn dataset(&self) -> Option<&str> {
        self.dataset.as_deref()
    }

    /// The full name as a single quoted SQL identifier.
    #[must_use]
    pub fn quoted(&self) -> String {
        quote_ident(&self.to_string())
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.dataset {
            Some(ds) => write!(f, "{ds}.{}", self.table),
            None => f.write_str(&self.table),
        }
    }
}

impl FromStr for TableRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let valid = |part: &str| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        };
        match s.rsplit_once('.') {
            Some((ds, table)) if valid(table) && ds.split('.').all(valid) => {
                Ok(Self::new(Some(ds), table))
            }
            None if valid(s) => Ok(Self::new(None, s)),
            _ => Err(Error::InvalidArgument(format!("invalid table name '{s}'"))),
        }
    }
}

impl TryFrom<String> for TableRef {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<TableRef> for String {
    fn from(t: TableRef) -> Self {
        t.to_string()
    }
}

/// Quote an SQL identifier, doubling embedded quotes.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Column types understood by the warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    Integer,
    Float,
    Date,
    Timestamp,
}

impl ColumnType {
    /// SQLite declared type for this column.
    #[must_use]
    pub const fn sql_type(&self) -> &'static str {
        match self {
            Self::Text | Self::Date | Self::Timestamp => "TEXT",
            Self::Integer => "INTEGER",
            Self::Float => "REAL",
        }
    }
}

/// One column of a destination table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub ty: ColumnType,
}

impl ColumnSpec {
    #[must_use]
    pub fn new(name: &str, ty: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            ty,
        }
    }
}

/// A typed row, values in schema column order.
pub type Row = Vec<Value>;

/// Explicit column -> type schema of a destination table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    columns: Vec<ColumnSpec>,
}

impl TableSchema {
    /// Build a schema. It must contain a `date` column of type `Date`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` on a missing or mistyped `date` column or on
    /// duplicate column names.
    pub fn new(columns: Vec<ColumnSpec>) -> Result<Self> {
        match columns.iter().find(|c| c.name == DATE_FIELD) {
            Some(c) if c.ty == ColumnType::Date => {}
            Some(_) => {
                return Err(Error::InvalidArgument(
                    "the 'date' column must have type date".into(),
                ));
            }
            None => {
                return Err(Error::InvalidArgument(
                    "table schema has no 'date' column".into(),
                ));
            }
        }
        for (i, col) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == col.name) {
                return Err(Error::InvalidArgument(format!(
                    "duplicate column '{}'",
                    col.name
                )));
            }
        }
        Ok(Self { columns })
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Reshape a record into a row following this schema.
    ///
    /// Fields outside the schema are dropped. Missing or null numerics
    /// become zero; missing text, dates and timestamps become NULL. The
    /// `date` column is mandatory.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecord` when a value cannot be coerced to its column
    /// type or the record has no usable `date`.
    pub fn conform(&self, record: &Record) -> Result<Row> {
        self.columns
            .iter()
            .map(|col| {
                let value = record.get(&col.name).unwrap_or(&Value::Null);
                let out = coerce(&col.name, col.ty, value)?;
                if col.name == DATE_FIELD && out.is_null() {
                    return Err(Error::InvalidRecord("record has no 'date' value".into()));
                }
                Ok(out)
            })
            .collect()
    }

    /// The `date` value of a conformed row.
    #[must_use]
    pub fn date_of(&self, row: &Row) -> Option<NaiveDate> {
        let idx = self.columns.iter().position(|c| c.name == DATE_FIELD)?;
        match row.get(idx)? {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Reshape a batch of records.
    ///
    /// # Errors
    ///
    /// Fails on the first record that does not conform.
    pub fn conform_all(&self, records: &[Record]) -> Result<Vec<Row>> {
        records.iter().map(|r| self.conform(r)).collect()
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn coerce(field: &str, ty: ColumnType, value: &Value) -> Result<Value> {
    let mismatch = || {
        Error::InvalidRecord(format!(
            "field '{field}' value {value:?} is not a valid {ty:?}"
        ))
    };

    if value.is_null() {
        return Ok(match ty {
            ColumnType::Integer => Value::Int(0),
            ColumnType::Float => Value::Float(0.0),
            _ => Value::Null,
        });
    }

    let out = match (ty, value) {
        (ColumnType::Text, Value::Text(s)) => Value::Text(s.clone()),
        (ColumnType::Text, Value::Int(n)) => Value::Text(n.to_string()),
        (ColumnType::Text, Value::Float(n)) => Value::Text(n.to_string()),
        (ColumnType::Text, Value::Date(d)) => Value::Text(d.to_string()),
        (ColumnType::Text, Value::Timestamp(t)) => Value::Text(t.to_string()),

        (ColumnType::Integer, Value::Int(n)) => Value::Int(*n),
        (ColumnType::Integer, Value::Float(n)) if n.is_finite() => Value::Int(n.round() as i64),
        (ColumnType::Integer, Value::Text(s)) if s.trim().is_empty() => Value::Int(0),
        (ColumnType::Integer, Value::Text(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.round() as i64))
                .map(Value::Int)
                .ok_or_else(mismatch)?
        }

        (ColumnType::Float, Value::Int(n)) => Value::Float(*n as f64),
        (ColumnType::Float, Value::Float(n)) => Value::Float(*n),
        (ColumnType::Float, Value::Text(s)) if s.trim().is_empty() => Value::Float(0.0),
        (ColumnType::Float, Value::Text(s)) => {
            Value::Float(s.trim().parse::<f64>().map_err(|_| mismatch())?)
        }

        (ColumnType::Date, Value::Date(d)) => Value::Date(*d),
        (ColumnType::Date, Value::Timestamp(t)) => Value::Date(t.date()),
        (ColumnType::Date, Value::Text(s)) => Value::Date(parse_date(s).ok_or_else(mismatch)?),

        (ColumnType::Timestamp, Value::Timestamp(t)) => Value::Timestamp(*t),
        (ColumnType::Timestamp, Value::Date(d)) => Value::Timestamp(d.and_time(chrono::NaiveTime::MIN)),
        (ColumnType::Timestamp, Value::Text(s)) => {
            Value::Timestamp(parse_timestamp(s).ok_or_else(mismatch)?)
        }

        _ => return Err(mismatch()),
    };

    Ok(out)
}

/// Parse a calendar date from `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` or RFC 3339.
#[must_use]
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(s).map(|t| t.date()))
}

/// Parse a timestamp from RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]` or a bare date.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.naive_utc())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok())
        .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> TableSchema {
        TableSchema::new(vec![
            ColumnSpec::new("date", ColumnType::Date),
            ColumnSpec::new("name", ColumnType::Text),
            ColumnSpec::new("imp", ColumnType::Integer),
            ColumnSpec::new("cost", ColumnType::Float),
            ColumnSpec::new("created_at", ColumnType::Timestamp),
        ])
        .unwrap()
    }

    #[test]
    fn test_table_ref_parse_and_quote() {
        let t: TableRef = "stackadapt.stackadapt_daily".parse().unwrap();
        assert_eq!(t.dataset(), Some("stackadapt"));
        assert_eq!(t.table(), "stackadapt_daily");
        assert_eq!(t.quoted(), "\"stackadapt.stackadapt_daily\"");

        let t: TableRef = "proj.ds.tbl".parse().unwrap();
        assert_eq!(t.dataset(), Some("proj.ds"));
        assert_eq!(t.to_string(), "proj.ds.tbl");

        assert!("bad name".parse::<TableRef>().is_err());
        assert!("ds.".parse::<TableRef>().is_err());
    }

    #[test]
    fn test_schema_requires_date_column() {
        let err = TableSchema::new(vec![ColumnSpec::new("id", ColumnType::Integer)]).unwrap_err();
        assert!(err.to_string().contains("'date'"));

        let err = TableSchema::new(vec![ColumnSpec::new("date", ColumnType::Text)]).unwrap_err();
        assert!(err.to_string().contains("type date"));
    }

    #[test]
    fn test_conform_defaults_missing_numerics_to_zero() {
        let record = Record::new()
            .with("date", Value::Text("2024-05-01".into()))
            .with("unknown", Value::Int(1));
        let row = schema().conform(&record).unwrap();

        assert_eq!(
            row,
            vec![
                Value::Date(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()),
                Value::Null,
                Value::Int(0),
                Value::Float(0.0),
                Value::Null,
            ]
        );
    }

    #[test]
    fn test_conform_coerces_strings() {
        let record = Record::new()
            .with("date", Value::Text("2024-05-01 00:00:00".into()))
            .with("imp", Value::Text("42".into()))
            .with("cost", Value::Int(3))
            .with("created_at", Value::Text("2021-02-01T10:00:00Z".into()));
        let row = schema().conform(&record).unwrap();

        assert_eq!(row[2], Value::Int(42));
        assert_eq!(row[3], Value::Float(3.0));
        assert_eq!(
            row[4],
            Value::Timestamp(
                NaiveDate::from_ymd_opt(2021, 2, 1)
                    .unwrap()
                    .and_hms_opt(10, 0, 0)
                    .unwrap()
            )
        );
    }

    #[test]
    fn test_conform_rejects_missing_date() {
        let record = Record::new().with("imp", Value::Int(1));
        assert!(matches!(schema().conform(&record), Err(Error::InvalidRecord(_))));
    }

    #[test]
    fn test_conform_rejects_garbage() {
        let record = Record::new()
            .with("date", Value::Text("2024-05-01".into()))
            .with("imp", Value::Text("lots".into()));
        let err = schema().conform(&record).unwrap_err();
        assert!(err.to_string().contains("'imp'"));
    }
}
