//! Structured error output for scripted callers.
//!
//! Provides machine-parseable error information with:
//! - Error codes for categorization
//! - Hints for self-correction
//! - Retryability flags
//! - Context for debugging

use crate::error::WorklogError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Machine-readable error codes.
///
/// These codes are stable and can be used for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // === Rollback Errors (exit code 3) ===
    /// Rollback ledger could not be processed
    RollbackFailed,
    /// Worklogs were created but the rollback ledger was not written
    LedgerNotSaved,

    // === Validation Errors (exit code 4) ===
    /// Field validation failed
    ValidationFailed,
    /// Date argument could not be parsed
    InvalidDate,

    // === Remote Errors (exit code 5) ===
    /// Tracker rejected the request
    TrackerRequestFailed,
    /// Tracker unreachable or overloaded
    TrackerUnavailable,

    // === Source Errors (exit code 6) ===
    /// Source file not found
    SourceNotFound,
    /// Source URL could not be fetched
    SourceFetchFailed,
    /// Source content is not valid CSV
    CsvParseError,

    // === Config Errors (exit code 7) ===
    /// Configuration error
    ConfigError,
    /// Config file not found
    ConfigNotFound,

    // === I/O Errors (exit code 8) ===
    /// File I/O error
    IoError,
    /// JSON serialization error
    JsonError,
    /// YAML parsing error
    YamlError,

    // === Internal Errors (exit code 1) ===
    /// Unexpected internal error
    InternalError,
}

impl ErrorCode {
    /// Get the string representation for JSON output.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RollbackFailed => "ROLLBACK_FAILED",
            Self::LedgerNotSaved => "LEDGER_NOT_SAVED",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::InvalidDate => "INVALID_DATE",
            Self::TrackerRequestFailed => "TRACKER_REQUEST_FAILED",
            Self::TrackerUnavailable => "TRACKER_UNAVAILABLE",
            Self::SourceNotFound => "SOURCE_NOT_FOUND",
            Self::SourceFetchFailed => "SOURCE_FETCH_FAILED",
            Self::CsvParseError => "CSV_PARSE_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::ConfigNotFound => "CONFIG_NOT_FOUND",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::YamlError => "YAML_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Whether this error is potentially retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TrackerUnavailable
                | Self::SourceFetchFailed
                | Self::ValidationFailed
                | Self::InvalidDate
        )
    }

    /// Get the exit code for this error category.
    ///
    /// - 1: Internal/unknown errors
    /// - 3: Rollback errors
    /// - 4: Validation errors
    /// - 5: Remote tracker errors
    /// - 6: Source errors
    /// - 7: Config errors
    /// - 8: I/O errors
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::RollbackFailed | Self::LedgerNotSaved => 3,
            Self::ValidationFailed | Self::InvalidDate => 4,
            Self::TrackerRequestFailed | Self::TrackerUnavailable => 5,
            Self::SourceNotFound | Self::SourceFetchFailed | Self::CsvParseError => 6,
            Self::ConfigError | Self::ConfigNotFound => 7,
            Self::IoError | Self::JsonError | Self::YamlError => 8,
            Self::InternalError => 1,
        }
    }
}

/// Structured error for machine-parseable output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Machine-readable error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional hint for fixing the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether the operation can be retried
    pub retryable: bool,
    /// Additional context data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl StructuredError {
    /// Create a new structured error from a `WorklogError`.
    #[must_use]
    pub fn from_error(err: &WorklogError) -> Self {
        let (code, context) = Self::extract_code_and_context(err);
        let hint = err.suggestion().map(str::to_string);
        let retryable = match err {
            WorklogError::Tracker(inner) => inner.is_retryable(),
            _ => code.is_retryable(),
        };

        Self {
            code,
            message: err.to_string(),
            hint,
            retryable,
            context,
        }
    }

    /// Create a structured error for a rollback that left records behind.
    #[must_use]
    pub fn rollback_incomplete(remaining: usize) -> Self {
        Self {
            code: ErrorCode::RollbackFailed,
            message: format!("Rollback incomplete: {remaining} worklog(s) could not be deleted"),
            hint: Some("Run 'jwi rollback' again to retry the remaining worklogs.".to_string()),
            retryable: true,
            context: Some(json!({ "remaining": remaining })),
        }
    }

    /// Create a structured error for an import whose rollback ledger was
    /// not written.
    #[must_use]
    pub fn ledger_not_saved(created: usize, reason: &str) -> Self {
        Self {
            code: ErrorCode::LedgerNotSaved,
            message: format!(
                "{created} worklog(s) were created but the rollback ledger could not be saved: {reason}"
            ),
            hint: Some(
                "Fix rollback.path. The created worklog ids are listed in the import output."
                    .to_string(),
            ),
            retryable: false,
            context: Some(json!({ "created": created })),
        }
    }

    /// Serialize to JSON value.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "error": {
                "code": self.code.as_str(),
                "message": self.message,
                "hint": self.hint,
                "retryable": self.retryable,
                "context": self.context,
            }
        })
    }

    /// Format for human-readable output.
    #[must_use]
    pub fn to_human(&self, color: bool) -> String {
        let mut output = String::new();

        if color {
            output.push_str("\x1b[31mError:\x1b[0m ");
        } else {
            output.push_str("Error: ");
        }

        output.push_str(&self.message);

        if let Some(hint) = &self.hint {
            output.push('\n');
            if color {
                output.push_str("\x1b[33mHint:\x1b[0m ");
            } else {
                output.push_str("Hint: ");
            }
            output.push_str(hint);
        }

        output
    }

    fn extract_code_and_context(err: &WorklogError) -> (ErrorCode, Option<Value>) {
        match err {
            WorklogError::Config(_) => (ErrorCode::ConfigError, None),
            WorklogError::ConfigNotFound { path } => (
                ErrorCode::ConfigNotFound,
                Some(json!({"path": path.display().to_string()})),
            ),
            WorklogError::InvalidDate { name, value } => (
                ErrorCode::InvalidDate,
                Some(json!({"argument": name, "value": value})),
            ),
            WorklogError::SourceNotFound { path } => (
                ErrorCode::SourceNotFound,
                Some(json!({"path": path.display().to_string()})),
            ),
            WorklogError::SourceFetch { url, .. } => {
                (ErrorCode::SourceFetchFailed, Some(json!({"url": url})))
            }
            WorklogError::TooManyRedirects { url, limit } => (
                ErrorCode::SourceFetchFailed,
                Some(json!({"url": url, "limit": limit})),
            ),
            WorklogError::CsvParse { line, .. } => {
                (ErrorCode::CsvParseError, Some(json!({"line": line})))
            }
            WorklogError::Tracker(inner) => {
                let code = if inner.is_retryable() {
                    ErrorCode::TrackerUnavailable
                } else {
                    ErrorCode::TrackerRequestFailed
                };
                (code, inner.status().map(|status| json!({"status": status})))
            }
            WorklogError::Validation { field, reason } => (
                ErrorCode::ValidationFailed,
                Some(json!({"field": field, "reason": reason})),
            ),
            WorklogError::Io(_) => (ErrorCode::IoError, None),
            WorklogError::Json(_) => (ErrorCode::JsonError, None),
            WorklogError::Yaml(_) => (ErrorCode::YamlError, None),
            WorklogError::WithContext { .. } | WorklogError::Other(_) => {
                (ErrorCode::InternalError, None)
            }
        }
    }
}
