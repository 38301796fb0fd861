//! SQLite warehouse implementation.
//!
//! Every write (delete, append, replace) goes through [`SqliteWarehouse::write`],
//! which runs it inside one IMMEDIATE transaction: a day's rows are either
//! all committed or not at all.

use chrono::NaiveDate;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Connection, ToSql, Transaction};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use super::runs::{RunRecord, insert_run, recent_runs};
use super::schema::{apply_schema, ensure_table, table_exists};
use super::{DatePredicate, ReplaceStats, Warehouse};
use crate::error::{Error, Result};
use crate::model::table::quote_ident;
use crate::model::{DATE_FIELD, Row, TableRef, TableSchema, Value, parse_date};

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Self::Int(n) => ToSqlOutput::Borrowed(ValueRef::Integer(*n)),
            Self::Float(n) => ToSqlOutput::Borrowed(ValueRef::Real(*n)),
            Self::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Self::Date(d) => ToSqlOutput::from(d.format("%Y-%m-%d").to_string()),
            Self::Timestamp(t) => ToSqlOutput::from(t.format("%Y-%m-%d %H:%M:%S").to_string()),
        })
    }
}

/// SQLite-backed destination warehouse.
#[derive(Debug)]
pub struct SqliteWarehouse {
    conn: Connection,
}

impl SqliteWarehouse {
    /// Open a warehouse at the given path.
    ///
    /// Creates the database file and metadata tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a warehouse with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_millis(timeout_ms.unwrap_or(5_000)))?;

        apply_schema(&mut conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory warehouse (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        apply_schema(&mut conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run a write inside one IMMEDIATE transaction.
    ///
    /// Any failure rolls the transaction back and is reported as a
    /// `Write` error naming the table and operation.
    fn write<F, R>(&mut self, table: &TableRef, operation: &'static str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction) -> rusqlite::Result<R>,
    {
        let to_write_error = |e: rusqlite::Error| Error::Write {
            table: table.to_string(),
            operation,
            message: e.to_string(),
        };

        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)
            .map_err(to_write_error)?;
        let result = f(&tx).map_err(to_write_error)?;
        tx.commit().map_err(to_write_error)?;
        Ok(result)
    }

    /// Count rows, optionally restricted to one date.
    ///
    /// A missing table counts as zero rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_rows(&self, table: &TableRef, day: Option<NaiveDate>) -> Result<usize> {
        if !table_exists(&self.conn, table)? {
            return Ok(0);
        }
        let n: i64 = match day {
            Some(day) => self.conn.query_row(
                &format!(
                    "SELECT COUNT(*) FROM {} WHERE {} = ?1",
                    table.quoted(),
                    quote_ident(DATE_FIELD)
                ),
                [Value::Date(day)],
                |row| row.get(0),
            )?,
            None => self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", table.quoted()),
                [],
                |row| row.get(0),
            )?,
        };
        Ok(usize::try_from(n).unwrap_or(0))
    }

    /// Recent runs of a pipeline, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn recent_runs(&self, pipeline: &str, limit: u32) -> Result<Vec<RunRecord>> {
        Ok(recent_runs(&self.conn, pipeline, limit)?)
    }
}

fn delete_in(conn: &Connection, table: &TableRef, predicate: DatePredicate) -> rusqlite::Result<usize> {
    if !table_exists(conn, table)? {
        return Ok(0);
    }
    let (op, day) = match predicate {
        DatePredicate::OnOrAfter(day) => (">=", day),
        DatePredicate::On(day) => ("=", day),
    };
    conn.execute(
        &format!(
            "DELETE FROM {} WHERE {} {op} ?1",
            table.quoted(),
            quote_ident(DATE_FIELD)
        ),
        [Value::Date(day)],
    )
}

fn append_in(
    conn: &Connection,
    table: &TableRef,
    schema: &TableSchema,
    rows: &[Row],
) -> rusqlite::Result<usize> {
    ensure_table(conn, table, schema)?;

    let names: Vec<String> = schema.columns().iter().map(|c| quote_ident(&c.name)).collect();
    let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table.quoted(),
        names.join(", "),
        placeholders.join(", ")
    ))?;

    for row in rows {
        stmt.execute(rusqlite::params_from_iter(row.iter()))?;
    }
    Ok(rows.len())
}

impl Warehouse for SqliteWarehouse {
    fn max_date(&self, table: &TableRef) -> Result<Option<NaiveDate>> {
        if !table_exists(&self.conn, table)? {
            return Err(Error::TableNotFound {
                table: table.to_string(),
            });
        }

        let max: Option<String> = self.conn.query_row(
            &format!(
                "SELECT MAX({}) FROM {}",
                quote_ident(DATE_FIELD),
                table.quoted()
            ),
            [],
            |row| row.get(0),
        )?;

        max.map(|s| {
            parse_date(&s).ok_or_else(|| {
                Error::InvalidRecord(format!("{table} holds an unparseable date '{s}'"))
            })
        })
        .transpose()
    }

    fn delete_rows(&mut self, table: &TableRef, predicate: DatePredicate) -> Result<usize> {
        let deleted = self.write(table, "delete", |tx| delete_in(tx, table, predicate))?;
        debug!(table = %table, ?predicate, deleted, "Deleted rows");
        Ok(deleted)
    }

    fn append(&mut self, table: &TableRef, schema: &TableSchema, rows: &[Row]) -> Result<usize> {
        let written = self.write(table, "append", |tx| append_in(tx, table, schema, rows))?;
        debug!(table = %table, written, "Appended rows");
        Ok(written)
    }

    fn replace(
        &mut self,
        table: &TableRef,
        predicate: DatePredicate,
        schema: &TableSchema,
        rows: &[Row],
    ) -> Result<ReplaceStats> {
        let stats = self.write(table, "replace", |tx| {
            let deleted = delete_in(tx, table, predicate)?;
            let written = append_in(tx, table, schema, rows)?;
            Ok(ReplaceStats { deleted, written })
        })?;
        debug!(table = %table, ?predicate, deleted = stats.deleted, written = stats.written, "Replaced window");
        Ok(stats)
    }

    fn record_run(&mut self, run: &RunRecord) -> Result<()> {
        Ok(insert_run(&self.conn, run)?)
    }
}
