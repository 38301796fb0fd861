//! Partition replacement: delete a date range, then append its fresh rows.
//!
//! The destination enforces no uniqueness, so re-running a window is only
//! idempotent because the window is cleared before it is written again.

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::error::Result;
use crate::model::{Row, SyncWindow, TableRef, TableSchema};
use crate::storage::{DatePredicate, ReplaceStats, Warehouse};

/// What a single replace covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// Everything from the window start onward (`date >= start`).
    Window,
    /// Exactly one day (`date = day`); the window must be a single day.
    Day,
}

/// Delete predicate for a window at the given granularity.
#[must_use]
pub const fn predicate_for(window: &SyncWindow, granularity: Granularity) -> DatePredicate {
    match granularity {
        Granularity::Window => DatePredicate::OnOrAfter(window.start()),
        Granularity::Day => DatePredicate::On(window.start()),
    }
}

fn in_scope(granularity: Granularity, window: &SyncWindow, day: NaiveDate) -> bool {
    match granularity {
        Granularity::Window => window.contains(day),
        Granularity::Day => day == window.start(),
    }
}

/// Replace the rows of `window` in `table`.
///
/// Rows dated outside the window are dropped with a warning: writing them
/// would create rows the next delete of this window would never clear.
///
/// # Errors
///
/// Returns `Error::Write` if the delete or the append fails. With a
/// transactional warehouse nothing from this call is committed in that case.
pub fn replace_window<W: Warehouse + ?Sized>(
    warehouse: &mut W,
    table: &TableRef,
    schema: &TableSchema,
    window: &SyncWindow,
    granularity: Granularity,
    rows: Vec<Row>,
) -> Result<ReplaceStats> {
    let total = rows.len();
    let rows: Vec<Row> = rows
        .into_iter()
        .filter(|row| {
            schema
                .date_of(row)
                .is_some_and(|day| in_scope(granularity, window, day))
        })
        .collect();
    if rows.len() < total {
        warn!(
            table = %table,
            %window,
            dropped = total - rows.len(),
            "Dropping rows dated outside the sync window"
        );
    }

    let stats = warehouse.replace(table, predicate_for(window, granularity), schema, &rows)?;
    info!(
        table = %table,
        %window,
        deleted = stats.deleted,
        written = stats.written,
        "Replaced partition"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnSpec, ColumnType, Value};
    use crate::storage::SqliteWarehouse;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn table() -> TableRef {
        "ads.daily".parse().unwrap()
    }

    fn schema() -> TableSchema {
        TableSchema::new(vec![
            ColumnSpec::new("date", ColumnType::Date),
            ColumnSpec::new("id", ColumnType::Integer),
        ])
        .unwrap()
    }

    fn row(day: NaiveDate, id: i64) -> Row {
        vec![Value::Date(day), Value::Int(id)]
    }

    fn seed(warehouse: &mut SqliteWarehouse) {
        let rows: Vec<Row> = (1..=5).map(|n| row(d(2024, 1, n), i64::from(n))).collect();
        warehouse.append(&table(), &schema(), &rows).unwrap();
    }

    #[test]
    fn test_window_replace_clears_tail_only() {
        let mut warehouse = SqliteWarehouse::open_memory().unwrap();
        seed(&mut warehouse);

        let window = SyncWindow::new(d(2024, 1, 4), d(2024, 1, 6)).unwrap();
        let stats = replace_window(
            &mut warehouse,
            &table(),
            &schema(),
            &window,
            Granularity::Window,
            vec![row(d(2024, 1, 4), 40), row(d(2024, 1, 5), 50), row(d(2024, 1, 6), 60)],
        )
        .unwrap();

        assert_eq!(stats, ReplaceStats { deleted: 2, written: 3 });
        assert_eq!(warehouse.count_rows(&table(), None).unwrap(), 6);
        assert_eq!(warehouse.count_rows(&table(), Some(d(2024, 1, 3))).unwrap(), 1);
    }

    #[test]
    fn test_rerunning_same_window_is_idempotent() {
        let mut warehouse = SqliteWarehouse::open_memory().unwrap();
        let window = SyncWindow::new(d(2024, 1, 1), d(2024, 1, 2)).unwrap();
        let rows = || vec![row(d(2024, 1, 1), 1), row(d(2024, 1, 2), 2)];

        for _ in 0..3 {
            replace_window(&mut warehouse, &table(), &schema(), &window, Granularity::Window, rows())
                .unwrap();
        }
        assert_eq!(warehouse.count_rows(&table(), None).unwrap(), 2);
    }

    #[test]
    fn test_day_replace_leaves_other_days() {
        let mut warehouse = SqliteWarehouse::open_memory().unwrap();
        seed(&mut warehouse);

        let window = SyncWindow::single_day(d(2024, 1, 3));
        let stats = replace_window(
            &mut warehouse,
            &table(),
            &schema(),
            &window,
            Granularity::Day,
            vec![row(d(2024, 1, 3), 30), row(d(2024, 1, 3), 31)],
        )
        .unwrap();

        assert_eq!(stats, ReplaceStats { deleted: 1, written: 2 });
        assert_eq!(warehouse.count_rows(&table(), None).unwrap(), 6);
        assert_eq!(warehouse.count_rows(&table(), Some(d(2024, 1, 5))).unwrap(), 1);
    }

    #[test]
    fn test_rows_outside_window_are_dropped() {
        let mut warehouse = SqliteWarehouse::open_memory().unwrap();
        let window = SyncWindow::single_day(d(2024, 1, 3));
        let stats = replace_window(
            &mut warehouse,
            &table(),
            &schema(),
            &window,
            Granularity::Day,
            vec![row(d(2024, 1, 3), 1), row(d(2024, 1, 4), 2), vec![Value::Null, Value::Int(3)]],
        )
        .unwrap();

        assert_eq!(stats.written, 1);
        assert_eq!(warehouse.count_rows(&table(), Some(d(2024, 1, 4))).unwrap(), 0);
    }

    #[test]
    fn test_predicate_for_granularity() {
        let window = SyncWindow::new(d(2024, 2, 1), d(2024, 2, 9)).unwrap();
        assert_eq!(
            predicate_for(&window, Granularity::Window),
            DatePredicate::OnOrAfter(d(2024, 2, 1))
        );
        assert_eq!(predicate_for(&window, Granularity::Day), DatePredicate::On(d(2024, 2, 1)));
    }
}
