//! Run log storage and retrieval.
//!
//! Every sync invocation leaves one row in `wsync_runs`: the window it
//! covered, what it wrote, and how it ended. The destination table stays the
//! only source of truth for resume; the log is for operators.

use rusqlite::{Connection, Result};
use serde::Serialize;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Window fully synced.
    Succeeded,
    /// Window synced, but some entities failed and were skipped.
    Partial,
    /// Nothing to do: the table is already at `today - lag`.
    UpToDate,
    /// Aborted by a fatal error.
    Failed,
}

impl RunStatus {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Partial => "partial",
            Self::UpToDate => "up_to_date",
            Self::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "succeeded" => Self::Succeeded,
            "partial" => Self::Partial,
            "up_to_date" => Self::UpToDate,
            _ => Self::Failed,
        }
    }
}

/// One row of the run log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    pub id: String,
    pub pipeline: String,
    /// `bulk` or `daily`.
    pub mode: String,
    pub window_start: Option<String>,
    pub window_end: Option<String>,
    pub rows_written: usize,
    pub rows_deleted: usize,
    pub entities_succeeded: usize,
    pub entities_empty: usize,
    pub entities_failed: usize,
    pub days_committed: usize,
    pub status: RunStatus,
    pub error: Option<String>,
    /// Unix milliseconds.
    pub started_at: i64,
    /// Unix milliseconds.
    pub finished_at: i64,
}

impl RunRecord {
    /// Start a new run record (id is a fresh UUID, counters zeroed).
    #[must_use]
    pub fn start(pipeline: &str, mode: &str) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            pipeline: pipeline.to_string(),
            mode: mode.to_string(),
            window_start: None,
            window_end: None,
            rows_written: 0,
            rows_deleted: 0,
            entities_succeeded: 0,
            entities_empty: 0,
            entities_failed: 0,
            days_committed: 0,
            status: RunStatus::Failed,
            error: None,
            started_at: now,
            finished_at: now,
        }
    }
}

#[allow(clippy::cast_possible_wrap)]
fn count(n: usize) -> i64 {
    n as i64
}

#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn uncount(n: i64) -> usize {
    n.max(0) as usize
}

/// Insert a run into the log.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_run(conn: &Connection, run: &RunRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO wsync_runs (id, pipeline, mode, window_start, window_end, rows_written,
             rows_deleted, entities_succeeded, entities_empty, entities_failed, days_committed,
             status, error, started_at, finished_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        rusqlite::params![
            run.id,
            run.pipeline,
            run.mode,
            run.window_start,
            run.window_end,
            count(run.rows_written),
            count(run.rows_deleted),
            count(run.entities_succeeded),
            count(run.entities_empty),
            count(run.entities_failed),
            count(run.days_committed),
            run.status.as_str(),
            run.error,
            run.started_at,
            run.finished_at,
        ],
    )?;
    Ok(())
}

/// Most recent runs for a pipeline, newest first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn recent_runs(conn: &Connection, pipeline: &str, limit: u32) -> Result<Vec<RunRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, pipeline, mode, window_start, window_end, rows_written, rows_deleted,
                entities_succeeded, entities_empty, entities_failed, days_committed,
                status, error, started_at, finished_at
         FROM wsync_runs
         WHERE pipeline = ?1
         ORDER BY started_at DESC, rowid DESC
         LIMIT ?2",
    )?;

    let rows = stmt.query_map(rusqlite::params![pipeline, limit], |row| {
        Ok(RunRecord {
            id: row.get(0)?,
            pipeline: row.get(1)?,
            mode: row.get(2)?,
            window_start: row.get(3)?,
            window_end: row.get(4)?,
            rows_written: uncount(row.get(5)?),
            rows_deleted: uncount(row.get(6)?),
            entities_succeeded: uncount(row.get(7)?),
            entities_empty: uncount(row.get(8)?),
            entities_failed: uncount(row.get(9)?),
            days_committed: uncount(row.get(10)?),
            status: RunStatus::parse(row.get::<_, String>(11)?.as_str()),
            error: row.get(12)?,
            started_at: row.get(13)?,
            finished_at: row.get(14)?,
        })
    })?;

    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::apply_schema;

    #[test]
    fn test_run_insert_and_list() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_schema(&mut conn).unwrap();

        let mut first = RunRecord::start("stackadapt", "bulk");
        first.status = RunStatus::Succeeded;
        first.rows_written = 12;
        first.window_start = Some("2024-03-01".into());
        first.window_end = Some("2024-03-04".into());
        insert_run(&conn, &first).unwrap();

        let mut second = RunRecord::start("stackadapt", "bulk");
        second.started_at = first.started_at + 1;
        second.error = Some("HTTP 502".into());
        insert_run(&conn, &second).unwrap();

        insert_run(&conn, &RunRecord::start("search_console", "daily")).unwrap();

        let runs = recent_runs(&conn, "stackadapt", 10).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].status, RunStatus::Failed);
        assert_eq!(runs[0].error.as_deref(), Some("HTTP 502"));
        assert_eq!(runs[1], first);

        assert_eq!(recent_runs(&conn, "stackadapt", 1).unwrap().len(), 1);
    }
}
