//! CLI definitions and entry point.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// Import worklogs from CSV or Google Sheets into Jira
#[derive(Parser, Debug)]
#[command(name = "jwi", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config.yml (defaults to CONFIG_PATH, then ./config.yml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Validate and print what would be sent; do not create worklogs
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Override a config value (repeatable), e.g. --set rate_limit.max_retries=5
    #[arg(long = "set", value_name = "KEY=VALUE", global = true)]
    pub set: Vec<String>,

    /// Also write JSON logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Increase verbosity (-v per-entry output, -vv info logs, -vvv debug logs)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import worklogs from a CSV file or URL
    Import(ImportArgs),

    /// Delete the worklogs created by the last import run
    Rollback,

    /// Clear the rollback ledger and the local fingerprint store
    Purge,

    /// Show where configuration and credentials come from
    Diagnose(DiagnoseArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ImportArgs {
    /// File path or URL; falls back to csv.source_url
    pub source: Option<String>,

    /// Import only entries dated on or after this day (YYYY-mm-dd)
    #[arg(long)]
    pub start_date: Option<String>,

    /// Import only entries dated on or before this day (YYYY-mm-dd)
    #[arg(long)]
    pub end_date: Option<String>,

    /// Write the JSON report to this file
    #[arg(long, value_name = "PATH")]
    pub report_json: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct DiagnoseArgs {
    /// Also check that this issue exists on the tracker
    #[arg(long, value_name = "KEY")]
    pub issue: Option<String>,
}

/// Flags every command needs.
#[derive(Debug, Clone, Default)]
pub struct OutputContext {
    pub json: bool,
    pub quiet: bool,
    pub verbose: u8,
    pub use_color: bool,
    pub dry_run: bool,
}

impl OutputContext {
    #[must_use]
    pub const fn is_verbose(&self) -> bool {
        self.verbose > 0
    }
}
