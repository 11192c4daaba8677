//! Error types and handling for `jira_worklog_import`.
//!
//! # Design
//!
//! - Uses `thiserror` for derive-based error types
//! - Supports `anyhow` integration for ad-hoc errors
//! - Provides recovery hints for user-facing errors
//! - Provides structured JSON output for scripted callers
//!
//! Per-entry failures (validation, remote rejections) never surface here:
//! the pipeline records them in the report. `WorklogError` is reserved for
//! failures that stop a command before or outside entry processing.

mod structured;

pub use structured::{ErrorCode, StructuredError};

use crate::tracker::TrackerError;
use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for `jira_worklog_import` operations.
#[derive(Error, Debug)]
pub enum WorklogError {
    // === Configuration Errors ===
    /// Configuration error (missing source, invalid setting, bad arguments).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Explicitly requested config file does not exist.
    #[error("Config file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// A date argument could not be parsed.
    #[error("Invalid {name}: '{value}' (use YYYY-mm-dd, e.g. 2025-01-15)")]
    InvalidDate { name: String, value: String },

    // === Source Errors ===
    /// Local source file does not exist.
    #[error("File not found: {path}")]
    SourceNotFound { path: PathBuf },

    /// Remote source could not be fetched.
    #[error("Failed to fetch {url}: {reason}")]
    SourceFetch { url: String, reason: String },

    /// Remote source kept redirecting.
    #[error("Too many redirects fetching {url} (limit {limit})")]
    TooManyRedirects { url: String, limit: usize },

    /// Tabular content could not be parsed.
    #[error("CSV parse error at line {line}: {reason}")]
    CsvParse { line: usize, reason: String },

    // === Remote Errors ===
    /// Issue tracker request failed outside per-entry processing.
    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),

    // === Validation Errors ===
    /// Field validation failed.
    #[error("Validation failed: {field}: {reason}")]
    Validation { field: String, reason: String },

    // === I/O Errors ===
    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // === Wrapped errors ===
    /// Error with additional context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Wrapped anyhow error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WorklogError {
    /// Can the user fix this without code changes?
    #[must_use]
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::ConfigNotFound { .. }
                | Self::InvalidDate { .. }
                | Self::SourceNotFound { .. }
                | Self::Validation { .. }
        )
    }

    /// Human-friendly suggestion for fixing this error.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::ConfigNotFound { .. } => Some("Check --config or CONFIG_PATH"),
            Self::InvalidDate { .. } => Some("Dates must look like 2025-01-15"),
            Self::SourceNotFound { .. } => {
                Some("Pass an existing CSV path or URL, or set csv.source_url in config")
            }
            Self::TooManyRedirects { .. } => Some("Check that the URL is publicly shared"),
            _ => None,
        }
    }

    /// Create a validation error for a specific field.
    #[must_use]
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Wrap any error with a context message.
    #[must_use]
    pub fn with_context(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

/// Result type using `WorklogError`.
pub type Result<T> = std::result::Result<T, WorklogError>;
