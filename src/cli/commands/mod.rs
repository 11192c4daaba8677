//! Command implementations.

pub mod diagnose;
pub mod import;
pub mod purge;
pub mod rollback;

use crate::cli::OutputContext;
use crate::config::{self, CliOverrides, Config, LoadedConfig};
use crate::error::Result;
use crate::tracker::{JiraClient, JiraCredentials};
use std::path::PathBuf;
use std::time::Duration;

/// How a command that ran to completion should exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandStatus {
    Success,
    /// At least one import entry failed.
    EntriesFailed,
    /// Some recorded worklogs could not be deleted.
    RollbackIncomplete(usize),
    /// Worklogs were created but the rollback ledger was not written.
    LedgerNotSaved { created: usize, reason: String },
}

impl CommandStatus {
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Success => 0,
            Self::EntriesFailed => 1,
            Self::RollbackIncomplete(_) | Self::LedgerNotSaved { .. } => 3,
        }
    }
}

/// Everything a command needs from the command line.
#[derive(Debug, Clone, Default)]
pub struct CommandContext {
    pub config_path: Option<PathBuf>,
    pub overrides: CliOverrides,
    pub output: OutputContext,
}

impl CommandContext {
    /// # Errors
    ///
    /// Returns an error if the config file is missing or invalid.
    pub fn load_config(&self) -> Result<LoadedConfig> {
        config::load_config(self.config_path.as_deref(), &self.overrides)
    }
}

/// Tracker client from config plus `JIRA_EMAIL` / `JIRA_PASSWORD`.
///
/// # Errors
///
/// Returns a config error if `jira.base_url` is missing or invalid.
pub fn jira_client(config: &Config) -> Result<JiraClient> {
    JiraClient::new(
        &config.jira.base_url,
        JiraCredentials::from_env(),
        Duration::from_secs(config.jira.timeout_secs),
    )
}

/// Pretty-print a JSON value to stdout.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
