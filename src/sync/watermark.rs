//! Watermark tracking: where the destination table ends, and where the next
//! run starts.
//!
//! The watermark is derived from table content (`MAX(date)`), never from a
//! separate offset store, so reruns after any failure recompute it from what
//! was actually committed.

use chrono::{Days, NaiveDate};
use tracing::{debug, info};

use super::types::WindowPolicy;
use crate::error::{Error, Result};
use crate::model::{SyncWindow, TableRef};
use crate::storage::Warehouse;

/// Where the next window starts relative to the watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePolicy {
    /// Start at `watermark - 1`: the last stored day may have been provisional
    /// and is fetched again in full (bulk mode, which deletes before append).
    RefetchLastDay,
    /// Start at `watermark + 1`: every stored day is final (daily mode).
    AfterLastDay,
}

/// Read the maximum `date` currently stored in `table`.
///
/// Returns `None` when the table does not exist yet or holds no rows;
/// callers treat that as a first run.
///
/// # Errors
///
/// Any failure other than a missing table aborts the sync.
pub fn read_watermark<W: Warehouse + ?Sized>(
    warehouse: &W,
    table: &TableRef,
) -> Result<Option<NaiveDate>> {
    match warehouse.max_date(table) {
        Ok(Some(date)) => {
            debug!(table = %table, watermark = %date, "Read watermark");
            Ok(Some(date))
        }
        Ok(None) => {
            info!(table = %table, "Destination table is empty, no watermark");
            Ok(None)
        }
        Err(Error::TableNotFound { .. }) => {
            info!(table = %table, "Destination table does not exist yet, no watermark");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Compute the next window to fetch.
///
/// - start: the historical floor without a watermark, otherwise
///   `watermark - 1` or `watermark + 1` depending on `resume`
/// - end: `today - lag_days`, further capped to `max_window_days` days
///
/// Returns `None` when start would land after end (nothing to do yet), and
/// for a refetch whose watermark already sits past end: the `date >= start`
/// delete would reach days this window cannot rewrite.
#[must_use]
pub fn resume_window(
    watermark: Option<NaiveDate>,
    policy: &WindowPolicy,
    resume: ResumePolicy,
    today: NaiveDate,
) -> Option<SyncWindow> {
    let start = match (watermark, resume) {
        (None, _) => policy.historical_floor,
        (Some(w), ResumePolicy::RefetchLastDay) => w.checked_sub_days(Days::new(1))?,
        (Some(w), ResumePolicy::AfterLastDay) => w.checked_add_days(Days::new(1))?,
    };
    let end = today.checked_sub_days(Days::new(u64::from(policy.lag_days)))?;
    if matches!((watermark, resume), (Some(w), ResumePolicy::RefetchLastDay) if w > end) {
        debug!(watermark = ?watermark, %end, "Watermark is past the lag cap");
        return None;
    }

    let window = SyncWindow::new(start, end).ok()?;
    // A refetch window must reach past the watermark day, or the
    // `date >= start` delete would drop that day without rewriting it.
    let min_days = match (watermark, resume) {
        (Some(_), ResumePolicy::RefetchLastDay) => 2,
        _ => 1,
    };
    Some(match policy.max_window_days {
        Some(max) => window.truncate(max.max(min_days)),
        None => window,
    })
}
