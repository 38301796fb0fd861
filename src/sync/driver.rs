//! Sync driver: watermark, fetch, reshape, replace.
//!
//! Two modes share the same skeleton:
//!
//! - **bulk** ([`SyncDriver::run_bulk`]): one window covering every day since
//!   `watermark - 1`, fetched entity by entity with per-entity failure
//!   isolation, then written with a single delete/append.
//! - **daily** ([`SyncDriver::run_daily`]): one day at a time from
//!   `watermark + 1`, each day committed on its own; the first failure stops
//!   the loop so the table never has a hole behind its watermark.
//!
//! Every run, successful or not, leaves an entry in the warehouse run log.

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use super::replace::{Granularity, replace_window};
use super::types::{EntityOutcome, SyncMode, SyncSettings, SyncSummary};
use super::watermark::{ResumePolicy, read_watermark, resume_window};
use crate::error::Result;
use crate::model::SyncWindow;
use crate::source::{BulkSource, DailySource};
use crate::storage::{RunRecord, RunStatus, Warehouse};

/// Runs one pipeline against one warehouse.
#[derive(Debug)]
pub struct SyncDriver<W: Warehouse> {
    warehouse: W,
    settings: SyncSettings,
    today: Option<NaiveDate>,
}

impl<W: Warehouse> SyncDriver<W> {
    #[must_use]
    pub const fn new(warehouse: W, settings: SyncSettings) -> Self {
        Self {
            warehouse,
            settings,
            today: None,
        }
    }

    /// Pin "today" instead of reading the clock.
    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    #[must_use]
    pub const fn warehouse(&self) -> &W {
        &self.warehouse
    }

    #[must_use]
    pub fn into_warehouse(self) -> W {
        self.warehouse
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }

    /// Read the watermark and compute this run's window.
    fn plan(&self, summary: &mut SyncSummary, resume: ResumePolicy) -> Result<Option<SyncWindow>> {
        info!(pipeline = %self.settings.pipeline, table = %self.settings.table, "Querying last synced date");
        summary.watermark = read_watermark(&self.warehouse, &self.settings.table)?;

        let window = resume_window(summary.watermark, &self.settings.window, resume, self.today());
        match window {
            Some(window) => info!(
                pipeline = %self.settings.pipeline,
                watermark = ?summary.watermark,
                %window,
                "Resuming sync"
            ),
            None => {
                info!(
                    pipeline = %self.settings.pipeline,
                    watermark = ?summary.watermark,
                    "Table is up to date"
                );
                summary.status = RunStatus::UpToDate;
            }
        }
        summary.window = window;
        Ok(window)
    }

    /// Mode A: fetch every entity over the whole window, then replace
    /// `date >= window.start` with the result.
    ///
    /// An entity whose fetch (or reshape) fails is logged, counted and
    /// skipped. When nothing was fetched and some entity failed, the table is
    /// left untouched; when every entity answered empty the window is still
    /// cleared, since the upstream now has no rows for it.
    ///
    /// # Errors
    ///
    /// Fails if the watermark cannot be read, the entity listing fails, or
    /// the write fails.
    pub async fn run_bulk<S: BulkSource>(&mut self, source: &S) -> Result<SyncSummary> {
        let run = RunRecord::start(&self.settings.pipeline, SyncMode::Bulk.as_str());
        let mut summary = SyncSummary::new(&self.settings.pipeline, SyncMode::Bulk);
        let result = self.bulk(source, &mut summary).await;
        self.finish(summary, run, result)
    }

    async fn bulk<S: BulkSource>(&mut self, source: &S, summary: &mut SyncSummary) -> Result<()> {
        let Some(window) = self.plan(summary, ResumePolicy::RefetchLastDay)? else {
            return Ok(());
        };

        let entities = source.list_entities().await?;
        let total = entities.len();
        info!(source = source.name(), entities = total, "Listed entities");

        let schema = source.schema();
        let mut rows = Vec::new();
        for (i, entity) in entities.iter().enumerate() {
            if i > 0 && !self.settings.entity_delay.is_zero() {
                tokio::time::sleep(self.settings.entity_delay).await;
            }

            let fetched = source
                .fetch_entity(entity, &window)
                .await
                .and_then(|records| schema.conform_all(&records));
            let outcome = match fetched {
                Ok(entity_rows) if entity_rows.is_empty() => {
                    info!(entity_id = %entity.id, "No rows for entity in window");
                    EntityOutcome::Empty
                }
                Ok(entity_rows) => {
                    let n = entity_rows.len();
                    rows.extend(entity_rows);
                    EntityOutcome::Succeeded { rows: n }
                }
                Err(e) => {
                    warn!(entity_id = %entity.id, error = %e, "Skipping entity");
                    EntityOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            summary.record_outcome(&entity.id, outcome);
            info!(processed = i + 1, total, "Entities processed");
        }

        if rows.is_empty() && summary.entities_failed > 0 {
            warn!(%window, failed = summary.entities_failed, "No rows fetched, leaving table untouched");
        } else {
            let stats = replace_window(
                &mut self.warehouse,
                &self.settings.table,
                schema,
                &window,
                Granularity::Window,
                rows,
            )?;
            summary.rows_deleted = stats.deleted;
            summary.rows_written = stats.written;
        }

        summary.status = if summary.entities_failed > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Succeeded
        };
        Ok(())
    }

    /// Mode B: fetch and commit one day at a time, in ascending order.
    ///
    /// Days with no rows are skipped. Days already committed stay committed
    /// when a later day fails.
    ///
    /// # Errors
    ///
    /// Returns the first fetch or write error; no later day is attempted.
    pub async fn run_daily<S: DailySource>(&mut self, source: &S) -> Result<SyncSummary> {
        let run = RunRecord::start(&self.settings.pipeline, SyncMode::Daily.as_str());
        let mut summary = SyncSummary::new(&self.settings.pipeline, SyncMode::Daily);
        let result = self.daily(source, &mut summary).await;
        self.finish(summary, run, result)
    }

    async fn daily<S: DailySource>(&mut self, source: &S, summary: &mut SyncSummary) -> Result<()> {
        let Some(window) = self.plan(summary, ResumePolicy::AfterLastDay)? else {
            return Ok(());
        };

        let schema = source.schema();
        for day in window.days() {
            let rows = match source
                .fetch_day(day)
                .await
                .and_then(|records| schema.conform_all(&records))
            {
                Ok(rows) => rows,
                Err(e) => {
                    warn!(%day, days_committed = summary.days_committed, error = %e, "Stopping day loop");
                    return Err(e);
                }
            };

            if rows.is_empty() {
                info!(%day, "No rows for day");
                summary.days_empty += 1;
                continue;
            }

            let stats = replace_window(
                &mut self.warehouse,
                &self.settings.table,
                schema,
                &SyncWindow::single_day(day),
                Granularity::Day,
                rows,
            )
            .inspect_err(|e| {
                warn!(%day, days_committed = summary.days_committed, error = %e, "Stopping day loop");
            })?;
            summary.rows_deleted += stats.deleted;
            summary.rows_written += stats.written;
            summary.days_committed += 1;
            info!(source = source.name(), %day, rows = stats.written, "Committed day");
        }

        summary.status = RunStatus::Succeeded;
        Ok(())
    }

    /// Write the run log entry and hand back the summary or the error.
    fn finish(
        &mut self,
        summary: SyncSummary,
        run: RunRecord,
        result: Result<()>,
    ) -> Result<SyncSummary> {
        let error = result.as_ref().err().map(ToString::to_string);
        let record = summary.to_run_record(run, error);
        if let Err(e) = self.warehouse.record_run(&record) {
            warn!(pipeline = %self.settings.pipeline, error = %e, "Failed to record run");
        }

        result?;
        info!(
            pipeline = %summary.pipeline,
            status = summary.status.as_str(),
            rows_written = summary.rows_written,
            rows_deleted = summary.rows_deleted,
            "Sync finished"
        );
        Ok(summary)
    }
}
