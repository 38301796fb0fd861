//! Status command implementation.

use chrono::{DateTime, NaiveDate};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

use crate::config::{Pipeline, load_config, resolve_db_path};
use crate::error::{Error, Result};
use crate::storage::{RunRecord, RunStatus, SqliteWarehouse};
use crate::sync::read_watermark;

/// Output for status command.
#[derive(Serialize)]
struct StatusOutput {
    warehouse: String,
    initialized: bool,
    pipelines: Vec<PipelineStatus>,
}

#[derive(Serialize)]
struct PipelineStatus {
    pipeline: &'static str,
    table: String,
    watermark: Option<NaiveDate>,
    recent_runs: Vec<RunRecord>,
}

/// Execute status command.
///
/// Reads only; a warehouse that does not exist yet is reported, not created.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded or the warehouse cannot
/// be queried.
pub fn execute(config_path: Option<&PathBuf>, limit: u32, json: bool) -> Result<()> {
    let config = load_config(config_path.map(PathBuf::as_path))?;
    let db_path = resolve_db_path(&config)
        .ok_or_else(|| Error::Config("Could not determine warehouse path".into()))?;

    let warehouse = if db_path.exists() {
        Some(SqliteWarehouse::open_with_timeout(&db_path, config.warehouse.busy_timeout_ms)?)
    } else {
        None
    };

    let mut pipelines = Vec::new();
    for pipeline in Pipeline::ALL {
        let table = config.table(pipeline);
        let (watermark, recent_runs) = match &warehouse {
            Some(w) => (
                read_watermark(w, &table)?,
                w.recent_runs(pipeline.name(), limit)?,
            ),
            None => (None, Vec::new()),
        };
        pipelines.push(PipelineStatus {
            pipeline: pipeline.name(),
            table: table.to_string(),
            watermark,
            recent_runs,
        });
    }

    let output = StatusOutput {
        warehouse: db_path.display().to_string(),
        initialized: warehouse.is_some(),
        pipelines,
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
    } else {
        print_status(&output);
    }
    Ok(())
}

fn print_status(output: &StatusOutput) {
    println!("{}", "wsync Status".bold().underline());
    println!();
    println!("Warehouse: {}", output.warehouse);
    if !output.initialized {
        println!("  {}", "(not created yet; the first sync creates it)".dimmed());
    }

    for p in &output.pipelines {
        println!();
        println!("{} {}", p.pipeline.cyan().bold(), format!("-> {}", p.table).dimmed());
        match p.watermark {
            Some(date) => println!("  Last synced date: {date}"),
            None => println!("  Last synced date: {}", "none".dimmed()),
        }

        if p.recent_runs.is_empty() {
            continue;
        }
        println!("  Recent runs:");
        for run in &p.recent_runs {
            let status = match run.status {
                RunStatus::Succeeded | RunStatus::UpToDate => run.status.as_str().green(),
                RunStatus::Partial => run.status.as_str().yellow(),
                RunStatus::Failed => run.status.as_str().red(),
            };
            let started = DateTime::from_timestamp_millis(run.started_at)
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            let window = match (&run.window_start, &run.window_end) {
                (Some(s), Some(e)) => format!("{s} .. {e}"),
                _ => "-".to_string(),
            };
            println!(
                "    {} {:<10} {:<24} {} rows",
                started.dimmed(),
                status,
                window,
                run.rows_written
            );
            if let Some(error) = &run.error {
                println!("      {}", error.red());
            }
        }
    }
}
