//! Incremental synchronization core.
//!
//! A sync cycle is: read the watermark (`MAX(date)` of the destination
//! table), derive the window still to fetch, drain the source's pages for
//! that window, reshape the records into rows, then replace the window's
//! partition in the destination.
//!
//! - **Paginate**: drain page-number or row-offset APIs into one collection
//! - **Watermark**: derive the resume window from table content
//! - **Replace**: delete-then-append of one window or one day
//! - **Driver**: bulk (Mode A) and per-day (Mode B) orchestration
//!
//! # Example
//!
//! ```ignore
//! use wsync::sync::SyncDriver;
//!
//! let mut driver = SyncDriver::new(warehouse, settings);
//! let summary = driver.run_daily(&source).await?;
//! println!("{} days committed", summary.days_committed);
//! ```

mod driver;
mod paginate;
mod replace;
mod types;
mod watermark;

pub use driver::SyncDriver;
pub use paginate::{Page, PageStyle, Paginator};
pub use replace::{Granularity, predicate_for, replace_window};
pub use types::{
    EntityFailure, EntityOutcome, SyncMode, SyncSettings, SyncSummary, WindowPolicy,
};
pub use watermark::{ResumePolicy, read_watermark, resume_window};
