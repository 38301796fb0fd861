//! Sync settings and per-run results.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::model::{SyncWindow, TableRef};
use crate::storage::{RunRecord, RunStatus};

/// The two driver modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// One delete/append cycle covering the whole window.
    Bulk,
    /// One committed append per calendar day.
    Daily,
}

impl SyncMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bulk => "bulk",
            Self::Daily => "daily",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the resume window is derived from the destination table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowPolicy {
    /// First date to fetch when the table is missing or empty.
    pub historical_floor: NaiveDate,
    /// Days of upstream data-coalescence delay; the window never ends after
    /// `today - lag_days`.
    pub lag_days: u32,
    /// Upper bound on days processed by one invocation.
    pub max_window_days: Option<u32>,
}

/// Everything the driver needs to know about one pipeline.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Pipeline name used in logs and the run log.
    pub pipeline: String,
    pub table: TableRef,
    pub window: WindowPolicy,
    /// Pause between consecutive per-entity fetches (bulk mode).
    pub entity_delay: Duration,
}

/// Result of fetching one entity in bulk mode.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityOutcome {
    Succeeded { rows: usize },
    /// The source had no rows for this entity in the window.
    Empty,
    Failed { reason: String },
}

/// A skipped entity and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityFailure {
    pub entity_id: String,
    pub reason: String,
}

/// Summary of one sync run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncSummary {
    pub pipeline: String,
    pub mode: SyncMode,
    /// Maximum `date` in the table before the run.
    pub watermark: Option<NaiveDate>,
    /// `None` when the table was already up to date.
    pub window: Option<SyncWindow>,
    pub rows_written: usize,
    pub rows_deleted: usize,
    pub entities_succeeded: usize,
    pub entities_empty: usize,
    pub entities_failed: usize,
    pub failures: Vec<EntityFailure>,
    pub days_committed: usize,
    pub days_empty: usize,
    pub status: RunStatus,
}

impl SyncSummary {
    #[must_use]
    pub fn new(pipeline: &str, mode: SyncMode) -> Self {
        Self {
            pipeline: pipeline.to_string(),
            mode,
            watermark: None,
            window: None,
            rows_written: 0,
            rows_deleted: 0,
            entities_succeeded: 0,
            entities_empty: 0,
            entities_failed: 0,
            failures: Vec::new(),
            days_committed: 0,
            days_empty: 0,
            status: RunStatus::Failed,
        }
    }

    /// Fold one entity's outcome into the counters.
    pub fn record_outcome(&mut self, entity_id: &str, outcome: EntityOutcome) {
        match outcome {
            EntityOutcome::Succeeded { .. } => self.entities_succeeded += 1,
            EntityOutcome::Empty => self.entities_empty += 1,
            EntityOutcome::Failed { reason } => {
                self.entities_failed += 1;
                self.failures.push(EntityFailure {
                    entity_id: entity_id.to_string(),
                    reason,
                });
            }
        }
    }

    /// Number of entities the run looked at.
    #[must_use]
    pub fn entities_total(&self) -> usize {
        self.entities_succeeded + self.entities_empty + self.entities_failed
    }

    /// Convert into a run log entry.
    #[must_use]
    pub fn to_run_record(&self, mut run: RunRecord, error: Option<String>) -> RunRecord {
        run.window_start = self.window.map(|w| w.start().to_string());
        run.window_end = self.window.map(|w| w.end().to_string());
        run.rows_written = self.rows_written;
        run.rows_deleted = self.rows_deleted;
        run.entities_succeeded = self.entities_succeeded;
        run.entities_empty = self.entities_empty;
        run.entities_failed = self.entities_failed;
        run.days_committed = self.days_committed;
        run.status = if error.is_some() {
            RunStatus::Failed
        } else {
            self.status
        };
        run.error = error;
        run.finished_at = chrono::Utc::now().timestamp_millis();
        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_outcome_counts() {
        let mut summary = SyncSummary::new("stackadapt", SyncMode::Bulk);
        summary.record_outcome("1", EntityOutcome::Succeeded { rows: 4 });
        summary.record_outcome("2", EntityOutcome::Empty);
        summary.record_outcome(
            "3",
            EntityOutcome::Failed {
                reason: "HTTP 500".into(),
            },
        );

        assert_eq!(summary.entities_total(), 3);
        assert_eq!(summary.entities_failed, 1);
        assert_eq!(summary.failures[0].entity_id, "3");
    }

    #[test]
    fn test_to_run_record_marks_errors_failed() {
        let mut summary = SyncSummary::new("search_console", SyncMode::Daily);
        summary.status = RunStatus::Succeeded;
        summary.days_committed = 2;

        let run = summary.to_run_record(
            RunRecord::start("search_console", "daily"),
            Some("boom".into()),
        );
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.days_committed, 2);
        assert_eq!(run.error.as_deref(), Some("boom"));
    }
}
