//! CLI definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// wsync - incremental ad-network and search-analytics sync
#[derive(Parser, Debug)]
#[command(name = "wsync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: ~/.wsync/config.json)
    #[arg(long, global = true, env = "WSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sync StackAdapt campaign delivery stats (one window per run)
    Stackadapt,

    /// Sync Search Console search analytics (one committed day at a time)
    SearchConsole,

    /// Show each pipeline's watermark and recent runs
    Status {
        /// Runs to show per pipeline
        #[arg(long, default_value_t = 5)]
        limit: u32,
    },

    /// Print version information
    Version,
}
