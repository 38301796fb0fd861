//! Destination warehouse layer.
//!
//! The sync core only talks to the [`Warehouse`] trait; [`SqliteWarehouse`]
//! is the bundled implementation.
//!
//! # Submodules
//!
//! - [`migrations`] - Metadata table migrations
//! - [`runs`] - Run log storage
//! - [`schema`] - Connection setup and destination-table DDL
//! - [`sqlite`] - SQLite warehouse implementation

pub mod migrations;
pub mod runs;
pub mod schema;
pub mod sqlite;

pub use runs::{RunRecord, RunStatus};
pub use sqlite::SqliteWarehouse;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::Result;
use crate::model::{Row, TableRef, TableSchema};

/// Row filter for deletes, always on the `date` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePredicate {
    /// `date >= day`: the tail of a multi-day window.
    OnOrAfter(NaiveDate),
    /// `date = day`: a single day.
    On(NaiveDate),
}

/// Outcome of a delete-then-append.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplaceStats {
    pub deleted: usize,
    pub written: usize,
}

/// A tabular destination keyed (by convention, not constraint) on `date`.
///
/// The store enforces no uniqueness; callers keep rows unique by deleting a
/// window before appending it again.
pub trait Warehouse {
    /// Maximum `date` in `table`.
    ///
    /// Returns `Ok(None)` for an existing but empty table and
    /// `Err(Error::TableNotFound)` when the table does not exist.
    fn max_date(&self, table: &TableRef) -> Result<Option<NaiveDate>>;

    /// Delete rows matching `predicate`. A missing table deletes nothing.
    fn delete_rows(&mut self, table: &TableRef, predicate: DatePredicate) -> Result<usize>;

    /// Append rows, creating (or widening) the table from `schema` first.
    fn append(&mut self, table: &TableRef, schema: &TableSchema, rows: &[Row]) -> Result<usize>;

    /// Delete `predicate`, then append `rows`.
    ///
    /// The default runs the two steps back to back; stores with transactions
    /// override it to make the pair atomic.
    fn replace(
        &mut self,
        table: &TableRef,
        predicate: DatePredicate,
        schema: &TableSchema,
        rows: &[Row],
    ) -> Result<ReplaceStats> {
        let deleted = self.delete_rows(table, predicate)?;
        let written = self.append(table, schema, rows)?;
        Ok(ReplaceStats { deleted, written })
    }

    /// Persist a run log entry.
    fn record_run(&mut self, run: &RunRecord) -> Result<()>;
}
