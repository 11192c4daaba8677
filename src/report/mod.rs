//! Per-run import report.
//!
//! Every entry that reaches processing lands in exactly one bucket:
//! imported, skipped or failed. Entries removed by the date filter are only
//! counted.

use crate::error::Result;
use crate::model::WorklogEntry;
use crate::util::write_atomic;
use crate::validation::ValidationFailure;
use serde::Serialize;
use std::path::Path;

/// Skip reason for entries already present on the tracker.
pub const REASON_DUPLICATE: &str = "duplicate";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportedEntry {
    /// `None` for dry-run previews.
    pub worklog_id: Option<String>,
    pub entry: WorklogEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    pub reason: String,
    pub entry: WorklogEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedEntry {
    pub error: String,
    /// Set when a validator rejected the entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validator: Option<String>,
    pub entry: WorklogEntry,
}

/// Bucket sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Outcome of one import run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    imported: Vec<ImportedEntry>,
    skipped: Vec<SkippedEntry>,
    failed: Vec<FailedEntry>,
    excluded_by_date: usize,
    ledger_error: Option<String>,
}

#[derive(Serialize)]
struct ReportJson<'a> {
    summary: ReportSummary,
    excluded_by_date: usize,
    imported: &'a [ImportedEntry],
    skipped: &'a [SkippedEntry],
    failed: &'a [FailedEntry],
    #[serde(skip_serializing_if = "Option::is_none")]
    ledger_error: Option<&'a str>,
}

impl ImportReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_imported(&mut self, entry: WorklogEntry, worklog_id: Option<String>) {
        self.imported.push(ImportedEntry { worklog_id, entry });
    }

    pub fn add_skipped(&mut self, entry: WorklogEntry, reason: impl Into<String>) {
        self.skipped.push(SkippedEntry {
            reason: reason.into(),
            entry,
        });
    }

    pub fn add_failed(&mut self, entry: WorklogEntry, error: impl Into<String>) {
        self.failed.push(FailedEntry {
            error: error.into(),
            validator: None,
            entry,
        });
    }

    pub fn add_invalid(&mut self, entry: WorklogEntry, failure: &ValidationFailure) {
        self.failed.push(FailedEntry {
            error: failure.reason.clone(),
            validator: Some(failure.validator.clone()),
            entry,
        });
    }

    pub fn set_excluded_by_date(&mut self, count: usize) {
        self.excluded_by_date = count;
    }

    /// Record that the rollback ledger for this run could not be written.
    pub fn set_ledger_error(&mut self, error: impl Into<String>) {
        self.ledger_error = Some(error.into());
    }

    #[must_use]
    pub fn imported(&self) -> &[ImportedEntry] {
        &self.imported
    }

    #[must_use]
    pub fn skipped(&self) -> &[SkippedEntry] {
        &self.skipped
    }

    #[must_use]
    pub fn failed(&self) -> &[FailedEntry] {
        &self.failed
    }

    #[must_use]
    pub const fn excluded_by_date(&self) -> usize {
        self.excluded_by_date
    }

    #[must_use]
    pub fn ledger_error(&self) -> Option<&str> {
        self.ledger_error.as_deref()
    }

    /// Worklogs created on the tracker in this run.
    #[must_use]
    pub fn created_count(&self) -> usize {
        self.imported.iter().filter(|i| i.worklog_id.is_some()).count()
    }

    #[must_use]
    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            imported: self.imported.len(),
            skipped: self.skipped.len(),
            failed: self.failed.len(),
        }
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Structured form: summary plus the three buckets.
    #[must_use]
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::to_value(ReportJson {
            summary: self.summary(),
            excluded_by_date: self.excluded_by_date,
            imported: &self.imported,
            skipped: &self.skipped,
            failed: &self.failed,
            ledger_error: self.ledger_error.as_deref(),
        })
        .unwrap_or(serde_json::Value::Null)
    }

    /// Write the JSON form to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.to_json_value())?;
        write_atomic(path, &json)?;
        tracing::info!(path = %path.display(), "Wrote import report");
        Ok(())
    }
}
