//! wsync - incremental ETL from paginated REST APIs into a warehouse
//!
//! Each run reads the destination table's watermark (`MAX(date)`), fetches
//! the window the table is missing, and replaces that window's partition:
//! delete first, append second, so reruns never duplicate rows.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`config`] - Config file and environment resolution
//! - [`model`] - Records, values, table schemas and sync windows
//! - [`source`] - StackAdapt and Search Console sources
//! - [`storage`] - Warehouse trait, SQLite warehouse and run log
//! - [`sync`] - Paginator, watermark tracker, partition replacer, driver
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod source;
pub mod storage;
pub mod sync;

pub use error::{Error, Result};
