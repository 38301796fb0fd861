//! Sync window: the inclusive date range fetched by one run.

use chrono::{Days, NaiveDate};
use serde::Serialize;
use std::fmt;

use crate::error::{Error, Result};

/// Inclusive `[start, end]` date range.
///
/// `start <= end` always holds; [`SyncWindow::new`] refuses anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl SyncWindow {
    /// Create a window.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `start` is after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidArgument(format!(
                "sync window start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// A window covering exactly one day.
    #[must_use]
    pub const fn single_day(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of calendar days covered (always at least 1).
    #[must_use]
    pub fn len_days(&self) -> u64 {
        // start <= end, so the difference is non-negative
        (self.end - self.start).num_days().unsigned_abs() + 1
    }

    #[must_use]
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Iterate the days of the window in ascending order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.end;
        self.start
            .iter_days()
            .take_while(move |d| *d <= end)
    }

    /// Shrink the window so it covers at most `max_days` days.
    #[must_use]
    pub fn truncate(self, max_days: u32) -> Self {
        let max_days = max_days.max(1);
        let capped = self
            .start
            .checked_add_days(Days::new(u64::from(max_days - 1)))
            .unwrap_or(self.end);
        Self {
            start: self.start,
            end: capped.min(self.end),
        }
    }
}

impl fmt::Display for SyncWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} .. {}]", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_rejects_inverted_range() {
        assert!(SyncWindow::new(d(2024, 1, 2), d(2024, 1, 1)).is_err());
        assert!(SyncWindow::new(d(2024, 1, 1), d(2024, 1, 1)).is_ok());
    }

    #[test]
    fn test_days_inclusive_across_month_end() {
        let window = SyncWindow::new(d(2024, 2, 28), d(2024, 3, 2)).unwrap();
        let days: Vec<_> = window.days().collect();
        assert_eq!(days, vec![d(2024, 2, 28), d(2024, 2, 29), d(2024, 3, 1), d(2024, 3, 2)]);
        assert_eq!(window.len_days(), 4);
    }

    #[test]
    fn test_truncate() {
        let window = SyncWindow::new(d(2024, 1, 1), d(2024, 1, 31)).unwrap();
        assert_eq!(window.truncate(7).end(), d(2024, 1, 7));
        assert_eq!(window.truncate(100), window);
        assert_eq!(window.truncate(0).end(), d(2024, 1, 1));
    }
}
