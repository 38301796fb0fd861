//! Pipeline commands: `wsync stackadapt` and `wsync search-console`.
//!
//! Both are parameterless: everything comes from the config file and
//! environment, so a scheduler can invoke them as-is.

use chrono::Utc;
use colored::Colorize;
use std::path::PathBuf;

use crate::config::{Pipeline, WsyncConfig, load_config, resolve_db_path};
use crate::error::{Error, Result};
use crate::source::{SearchConsoleSource, StackAdaptSource};
use crate::storage::{RunStatus, SqliteWarehouse};
use crate::sync::{SyncDriver, SyncMode, SyncSummary};

/// Execute one sync cycle of `pipeline`.
///
/// # Errors
///
/// Returns config errors before touching the warehouse; otherwise whatever
/// the sync run fails with.
pub fn execute(pipeline: Pipeline, config_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let config = load_config(config_path.map(PathBuf::as_path))?;
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))?;

    let summary = match pipeline {
        Pipeline::StackAdapt => {
            let settings = config.pipeline(pipeline);
            let source = StackAdaptSource::new(config.credentials(pipeline)?, settings.endpoint.clone())?
                .with_max_rows(settings.max_rows);
            let mut driver = open_driver(&config, pipeline)?;
            rt.block_on(driver.run_bulk(&source))?
        }
        Pipeline::SearchConsole => {
            let settings = config.pipeline(pipeline);
            let site_url = settings
                .site_url
                .as_deref()
                .ok_or_else(|| Error::Config("search_console.site_url is not set".into()))?;
            let mut source = SearchConsoleSource::new(
                site_url,
                config.credentials(pipeline)?,
                config.dimensions(),
                settings.endpoint.as_deref(),
            )?
            .with_max_rows(settings.max_rows);
            if let Some(batch_size) = settings.batch_size {
                source = source.with_row_limit(batch_size);
            }
            let mut driver = open_driver(&config, pipeline)?;
            rt.block_on(driver.run_daily(&source))?
        }
    };

    print_summary(&summary, json)
}

fn open_driver(config: &WsyncConfig, pipeline: Pipeline) -> Result<SyncDriver<SqliteWarehouse>> {
    let db_path = resolve_db_path(config)
        .ok_or_else(|| Error::Config("Could not determine warehouse path".into()))?;
    let warehouse = SqliteWarehouse::open_with_timeout(&db_path, config.warehouse.busy_timeout_ms)?;
    let settings = config.settings(pipeline, Utc::now().date_naive());
    Ok(SyncDriver::new(warehouse, settings))
}

fn print_summary(summary: &SyncSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(summary)?);
        return Ok(());
    }

    let status = match summary.status {
        RunStatus::Succeeded => "succeeded".green(),
        RunStatus::UpToDate => "up to date".green(),
        RunStatus::Partial => "partial".yellow(),
        RunStatus::Failed => "failed".red(),
    };
    println!("{} {}", summary.pipeline.bold(), status);

    let Some(window) = summary.window else {
        if let Some(watermark) = summary.watermark {
            println!("  Last synced date: {watermark}");
        }
        return Ok(());
    };

    println!("  Window:   {window}");
    println!(
        "  Rows:     {} written, {} deleted",
        summary.rows_written, summary.rows_deleted
    );
    match summary.mode {
        SyncMode::Bulk => {
            println!(
                "  Entities: {} total, {} ok, {} empty, {} failed",
                summary.entities_total(),
                summary.entities_succeeded,
                summary.entities_empty,
                summary.entities_failed
            );
            for failure in &summary.failures {
                println!("    {} {}: {}", "✗".red(), failure.entity_id, failure.reason.dimmed());
            }
        }
        SyncMode::Daily => {
            println!(
                "  Days:     {} committed, {} empty",
                summary.days_committed, summary.days_empty
            );
        }
    }
    Ok(())
}
