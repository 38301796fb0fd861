//! Configuration management.
//!
//! Settings live in `~/.wsync/config.json` (or the file named by `--config`
//! / `WSYNC_CONFIG`). Every field is optional; a missing file yields the
//! built-in defaults. Secrets resolve environment first, then config file:
//!
//! - `STACKADAPT_API_KEY` > `stackadapt.credentials`
//! - `GOOGLE_ACCESS_TOKEN` > `search_console.credentials`
//! - `WSYNC_DB` > `warehouse.path` > `~/.wsync/warehouse.db`
//!
//! ```json
//! {
//!   "warehouse": { "path": "/var/lib/wsync/warehouse.db" },
//!   "stackadapt": { "table": "stackadapt.stackadapt_daily", "lag_days": 1 },
//!   "search_console": {
//!     "site_url": "sc-domain:example.com",
//!     "dimensions": ["page", "query", "device", "country"],
//!     "max_window_days": 30
//!   }
//! }
//! ```

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::model::TableRef;
use crate::source::{search_console, stackadapt};
use crate::sync::{SyncSettings, WindowPolicy};

/// Search Console keeps about 16 months of history.
const SEARCH_CONSOLE_RETENTION_DAYS: u64 = 480;

/// The two built-in pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    StackAdapt,
    SearchConsole,
}

impl Pipeline {
    pub const ALL: [Self; 2] = [Self::StackAdapt, Self::SearchConsole];

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::StackAdapt => stackadapt::NAME,
            Self::SearchConsole => search_console::NAME,
        }
    }

    const fn default_table(self) -> &'static str {
        match self {
            Self::StackAdapt => "stackadapt.stackadapt_daily",
            Self::SearchConsole => "search_console.search_daily",
        }
    }

    const fn default_lag_days(self) -> u32 {
        match self {
            Self::StackAdapt => 1,
            Self::SearchConsole => 3,
        }
    }

    const fn default_entity_delay_ms(self) -> u64 {
        match self {
            Self::StackAdapt => 100,
            Self::SearchConsole => 0,
        }
    }

    fn default_floor(self, today: NaiveDate) -> NaiveDate {
        match self {
            Self::StackAdapt => stackadapt::DEFAULT_FLOOR.unwrap_or(NaiveDate::MIN),
            Self::SearchConsole => today
                .checked_sub_days(Days::new(SEARCH_CONSOLE_RETENTION_DAYS))
                .unwrap_or(today),
        }
    }

    const fn secret_env(self) -> &'static str {
        match self {
            Self::StackAdapt => "STACKADAPT_API_KEY",
            Self::SearchConsole => "GOOGLE_ACCESS_TOKEN",
        }
    }
}

/// Full config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WsyncConfig {
    pub warehouse: WarehouseConfig,
    pub stackadapt: PipelineConfig,
    pub search_console: PipelineConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    /// SQLite database file.
    pub path: Option<PathBuf>,
    pub busy_timeout_ms: Option<u64>,
}

/// Per-pipeline tuning. Unset fields fall back to the pipeline's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// API key (StackAdapt) or OAuth access token (Search Console).
    pub credentials: Option<String>,
    /// Search Console property, e.g. `sc-domain:example.com`.
    pub site_url: Option<String>,
    /// Destination table, `dataset.table`.
    pub table: Option<TableRef>,
    pub lag_days: Option<u32>,
    /// Rows per page (Search Console `rowLimit`).
    pub batch_size: Option<usize>,
    pub historical_floor_date: Option<NaiveDate>,
    /// Search Console breakdown columns.
    pub dimensions: Option<Vec<String>>,
    /// Days processed by one invocation at most.
    pub max_window_days: Option<u32>,
    /// Row cap for one pagination drain.
    pub max_rows: Option<usize>,
    /// Pause between per-entity requests.
    pub entity_delay_ms: Option<u64>,
    /// API base URL override.
    pub endpoint: Option<String>,
}

impl WsyncConfig {
    #[must_use]
    pub const fn pipeline(&self, pipeline: Pipeline) -> &PipelineConfig {
        match pipeline {
            Pipeline::StackAdapt => &self.stackadapt,
            Pipeline::SearchConsole => &self.search_console,
        }
    }

    /// Driver settings for a pipeline, defaults filled in.
    ///
    /// `today` anchors date-relative defaults (the Search Console floor).
    #[must_use]
    pub fn settings(&self, pipeline: Pipeline, today: NaiveDate) -> SyncSettings {
        let config = self.pipeline(pipeline);
        SyncSettings {
            pipeline: pipeline.name().to_string(),
            table: self.table(pipeline),
            window: WindowPolicy {
                historical_floor: config
                    .historical_floor_date
                    .unwrap_or_else(|| pipeline.default_floor(today)),
                lag_days: config.lag_days.unwrap_or_else(|| pipeline.default_lag_days()),
                max_window_days: config.max_window_days,
            },
            entity_delay: Duration::from_millis(
                config
                    .entity_delay_ms
                    .unwrap_or_else(|| pipeline.default_entity_delay_ms()),
            ),
        }
    }

    /// Destination table of a pipeline.
    #[must_use]
    pub fn table(&self, pipeline: Pipeline) -> TableRef {
        self.pipeline(pipeline).table.clone().unwrap_or_else(|| {
            let (dataset, table) = pipeline
                .default_table()
                .split_once('.')
                .unwrap_or(("", pipeline.default_table()));
            TableRef::new(Some(dataset), table)
        })
    }

    /// The pipeline's credential, environment first.
    ///
    /// # Errors
    ///
    /// Returns `Config` when neither the environment nor the config file
    /// provides one.
    pub fn credentials(&self, pipeline: Pipeline) -> Result<String> {
        let env = pipeline.secret_env();
        first_non_empty(
            std::env::var(env).ok(),
            self.pipeline(pipeline).credentials.as_deref(),
        )
        .ok_or_else(|| {
            let what = match pipeline {
                Pipeline::StackAdapt => "stackadapt api key",
                Pipeline::SearchConsole => "search console access token",
            };
            Error::Config(format!("missing {what} (set {env})"))
        })
    }

    /// Search Console dimension list.
    #[must_use]
    pub fn dimensions(&self) -> Vec<String> {
        self.search_console.dimensions.clone().unwrap_or_else(|| {
            search_console::DEFAULT_DIMENSIONS
                .iter()
                .map(ToString::to_string)
                .collect()
        })
    }
}

fn first_non_empty(env: Option<String>, configured: Option<&str>) -> Option<String> {
    env.filter(|v| !v.trim().is_empty())
        .or_else(|| configured.filter(|v| !v.trim().is_empty()).map(str::to_string))
}

/// Get the wsync home directory (`~/.wsync`).
#[must_use]
pub fn wsync_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".wsync"))
}

/// Default config file location.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    wsync_dir().map(|dir| dir.join("config.json"))
}

/// Load the configuration.
///
/// An explicit path must exist. The default path may be absent, in which
/// case defaults are returned.
///
/// # Errors
///
/// Returns `ConfigNotFound` for a missing explicit file and `Config` for a
/// file that cannot be read or parsed.
pub fn load_config(explicit: Option<&Path>) -> Result<WsyncConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::ConfigNotFound {
                    path: path.to_path_buf(),
                });
            }
            path.to_path_buf()
        }
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(WsyncConfig::default()),
        },
    };

    let content = fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Failed to read config file {}: {e}", path.display())))?;

    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse config file {}: {e}", path.display())))
}

/// Resolve the warehouse database path.
///
/// Priority:
/// 1. `WSYNC_DB` environment variable
/// 2. `warehouse.path` from the config file
/// 3. `~/.wsync/warehouse.db`
#[must_use]
pub fn resolve_db_path(config: &WsyncConfig) -> Option<PathBuf> {
    if let Ok(db_path) = std::env::var("WSYNC_DB") {
        if !db_path.trim().is_empty() {
            return Some(PathBuf::from(db_path));
        }
    }

    if let Some(path) = &config.warehouse.path {
        return Some(path.clone());
    }

    wsync_dir().map(|dir| dir.join("warehouse.db"))
}
