//! Connection setup and destination-table DDL.
//!
//! Destination tables are created lazily on first append from the
//! pipeline's [`TableSchema`], and widened when the schema gains columns.

use rusqlite::{Connection, Result};
use tracing::info;

use crate::model::table::quote_ident;
use crate::model::{DATE_FIELD, TableRef, TableSchema};

/// Apply pragmas and bring the metadata tables up to date.
///
/// # Errors
///
/// Returns an error if a pragma or migration fails.
pub fn apply_schema(conn: &mut Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    super::migrations::run_migrations(conn)
}

/// Check if a table exists.
pub fn table_exists(conn: &Connection, table: &TableRef) -> Result<bool> {
    conn.prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?
        .exists([table.to_string()])
}

/// Names of the columns currently present in a table.
pub fn existing_columns(conn: &Connection, table: &TableRef) -> Result<Vec<String>> {
    conn.prepare("SELECT name FROM pragma_table_info(?1)")?
        .query_map([table.to_string()], |row| row.get(0))?
        .collect()
}

/// Make sure `table` exists and has every column of `schema`.
///
/// Creates the table (plus an index on `date`) when absent. Columns the
/// schema gained since the table was created are added; columns the schema
/// dropped are left in place.
pub fn ensure_table(conn: &Connection, table: &TableRef, schema: &TableSchema) -> Result<()> {
    if !table_exists(conn, table)? {
        let columns: Vec<String> = schema
            .columns()
            .iter()
            .map(|c| format!("{} {}", quote_ident(&c.name), c.ty.sql_type()))
            .collect();
        conn.execute_batch(&format!(
            "CREATE TABLE {} ({});
             CREATE INDEX IF NOT EXISTS {} ON {} ({});",
            table.quoted(),
            columns.join(", "),
            quote_ident(&format!("{table}__date_idx")),
            table.quoted(),
            quote_ident(DATE_FIELD),
        ))?;
        info!(table = %table, columns = columns.len(), "Created destination table");
        return Ok(());
    }

    let existing = existing_columns(conn, table)?;
    for col in schema.columns() {
        if !existing.iter().any(|e| e == &col.name) {
            conn.execute(
                &format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    table.quoted(),
                    quote_ident(&col.name),
                    col.ty.sql_type()
                ),
                [],
            )?;
            info!(table = %table, column = %col.name, "Added column to destination table");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnSpec, ColumnType};

    fn schema(extra: bool) -> TableSchema {
        let mut cols = vec![
            ColumnSpec::new("date", ColumnType::Date),
            ColumnSpec::new("clicks", ColumnType::Integer),
        ];
        if extra {
            cols.push(ColumnSpec::new("ctr", ColumnType::Float));
        }
        TableSchema::new(cols).unwrap()
    }

    #[test]
    fn test_apply_schema_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_schema(&mut conn).expect("First apply failed");
        apply_schema(&mut conn).expect("Second apply failed");
        assert!(table_exists(&conn, &"wsync_runs".parse().unwrap()).unwrap());
    }

    #[test]
    fn test_ensure_table_creates_then_widens() {
        let conn = Connection::open_in_memory().unwrap();
        let table: TableRef = "gsc.search_daily".parse().unwrap();

        assert!(!table_exists(&conn, &table).unwrap());
        ensure_table(&conn, &table, &schema(false)).unwrap();
        assert_eq!(existing_columns(&conn, &table).unwrap(), vec!["date", "clicks"]);

        // Re-running with the same schema is a no-op.
        ensure_table(&conn, &table, &schema(false)).unwrap();

        ensure_table(&conn, &table, &schema(true)).unwrap();
        assert_eq!(
            existing_columns(&conn, &table).unwrap(),
            vec!["date", "clicks", "ctr"]
        );
    }
}
