//! Upstream data sources.
//!
//! A source is either entity-oriented ([`BulkSource`]: list entities, then
//! fetch each one's rows for a whole window) or day-oriented
//! ([`DailySource`]: fetch every row of one calendar day). The sync driver
//! only depends on these traits.
//!
//! # Submodules
//!
//! - [`http`] - Shared HTTP client setup and response checks
//! - [`search_console`] - Search analytics, one day at a time
//! - [`stackadapt`] - Ad campaign delivery stats

pub mod http;
pub mod search_console;
pub mod stackadapt;

pub use search_console::SearchConsoleSource;
pub use stackadapt::StackAdaptSource;

use chrono::NaiveDate;
use std::future::Future;

use crate::error::Result;
use crate::model::{Record, SyncWindow, TableSchema};

/// One upstream entity (e.g. an ad campaign) whose rows are fetched
/// separately.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: String,
    /// Entity-level fields copied onto each of its rows.
    pub record: Record,
}

/// A source fetched entity by entity over a multi-day window.
pub trait BulkSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Schema of the destination table this source fills.
    fn schema(&self) -> &TableSchema;

    /// List every entity to fetch.
    fn list_entities(&self) -> impl Future<Output = Result<Vec<Entity>>> + Send;

    /// All rows of one entity inside `window`, entity fields included.
    ///
    /// An empty vector means the entity had no activity in the window.
    fn fetch_entity(
        &self,
        entity: &Entity,
        window: &SyncWindow,
    ) -> impl Future<Output = Result<Vec<Record>>> + Send;
}

/// A source queried one calendar day at a time.
pub trait DailySource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Schema of the destination table this source fills.
    fn schema(&self) -> &TableSchema;

    /// Every row for `day`, fully drained.
    fn fetch_day(&self, day: NaiveDate) -> impl Future<Output = Result<Vec<Record>>> + Send;
}
