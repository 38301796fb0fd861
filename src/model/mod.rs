//! Data models for wsync.
//!
//! - Record / Value: loosely typed rows as pulled from a source
//! - SyncWindow: the inclusive date range a run fetches
//! - TableRef / TableSchema: destination table identity and typed shape

pub mod record;
pub mod table;
pub mod window;

pub use record::{DATE_FIELD, Record, Value};
pub use table::{ColumnSpec, ColumnType, Row, TableRef, TableSchema, parse_date, parse_timestamp};
pub use window::SyncWindow;
