//! Rollback of the most recent import run.
//!
//! `RollbackLedger` persists the worklogs created by the last successful
//! run; `RollbackExecutor` deletes them again. Only one run is kept: every
//! save replaces the previous contents.

use crate::dedup::FingerprintStore;
use crate::error::{Result, WorklogError};
use crate::http::RateLimiter;
use crate::model::RollbackRecord;
use crate::tracker::WorklogGateway;
use crate::util::write_atomic;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Default ledger location, relative to the working directory.
pub const DEFAULT_LEDGER_PATH: &str = ".jira_worklog_rollback.json";

const LEDGER_VERSION: u32 = 1;

#[derive(Serialize)]
struct LedgerFile<'a> {
    version: u32,
    timestamp: String,
    last_run: &'a [RollbackRecord],
}

/// On-disk record of the last run's created worklogs.
#[derive(Debug, Clone)]
pub struct RollbackLedger {
    path: PathBuf,
}

impl Default for RollbackLedger {
    fn default() -> Self {
        Self::new(DEFAULT_LEDGER_PATH)
    }
}

impl RollbackLedger {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the stored run with `records`.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be serialized or written.
    pub fn save_run(&self, records: &[RollbackRecord]) -> Result<()> {
        let file = LedgerFile {
            version: LEDGER_VERSION,
            timestamp: Utc::now().to_rfc3339(),
            last_run: records,
        };
        let json = serde_json::to_vec_pretty(&file)?;
        write_atomic(&self.path, &json).map_err(|e| {
            WorklogError::with_context(
                format!("Failed to write rollback ledger {}", self.path.display()),
                e,
            )
        })?;
        tracing::debug!(path = %self.path.display(), records = records.len(), "Saved rollback ledger");
        Ok(())
    }

    /// Load the stored run.
    ///
    /// Returns `None` when there is no ledger, the run is null, or the file
    /// is not valid JSON. The legacy `{"last_run": {"KEY": [ids]}}` shape is
    /// converted to records.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn load_last_run(&self) -> Result<Option<Vec<RollbackRecord>>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let data: Value = match serde_json::from_str(&content) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Rollback ledger is not valid JSON");
                return Ok(None);
            }
        };

        let records = match data.get("last_run") {
            None | Some(Value::Null) => None,
            Some(Value::Array(_)) => match Vec::<RollbackRecord>::deserialize(&data["last_run"]) {
                Ok(records) => Some(records),
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "Rollback ledger has unreadable records");
                    None
                }
            },
            Some(Value::Object(legacy)) => {
                tracing::debug!(path = %self.path.display(), "Normalizing legacy rollback ledger");
                Some(normalize_legacy(legacy))
            }
            Some(other) => {
                tracing::warn!(path = %self.path.display(), kind = %value_kind(other), "Unexpected last_run in rollback ledger");
                None
            }
        };
        Ok(records)
    }

    /// Empty the ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be written.
    pub fn clear(&self) -> Result<()> {
        self.save_run(&[])
    }
}

fn normalize_legacy(legacy: &serde_json::Map<String, Value>) -> Vec<RollbackRecord> {
    let mut records = Vec::new();
    for (issue_key, ids) in legacy {
        let ids = match ids {
            Value::Array(ids) => ids.clone(),
            Value::Null => Vec::new(),
            single => vec![single.clone()],
        };
        for id in ids {
            let worklog_id = match id {
                Value::String(id) => id,
                Value::Null => continue,
                other => other.to_string(),
            };
            records.push(RollbackRecord::new(issue_key.clone(), worklog_id));
        }
    }
    records
}

const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A record whose deletion failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackFailure {
    pub issue_key: String,
    pub worklog_id: String,
    pub error: String,
}

/// Outcome of a rollback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RollbackSummary {
    pub deleted: usize,
    pub errors: Vec<RollbackFailure>,
    pub hashes_cleared: usize,
}

impl RollbackSummary {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Called after each successful deletion with the elapsed request time.
pub type RollbackHook = Box<dyn FnMut(&str, &str, Duration)>;

/// Deletes the worklogs recorded in the ledger.
pub struct RollbackExecutor<G> {
    gateway: G,
    ledger: RollbackLedger,
    store: Option<FingerprintStore>,
    rate_limiter: Option<RateLimiter>,
    on_rollback: Option<RollbackHook>,
}

impl<G: WorklogGateway> RollbackExecutor<G> {
    #[must_use]
    pub const fn new(gateway: G, ledger: RollbackLedger) -> Self {
        Self {
            gateway,
            ledger,
            store: None,
            rate_limiter: None,
            on_rollback: None,
        }
    }

    /// Remove rolled-back fingerprints from a local store.
    #[must_use]
    pub fn with_store(mut self, store: FingerprintStore) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    #[must_use]
    pub fn on_rollback(mut self, hook: impl FnMut(&str, &str, Duration) + 'static) -> Self {
        self.on_rollback = Some(Box::new(hook));
        self
    }

    /// Delete every recorded worklog.
    ///
    /// Individual failures are collected, not raised. The ledger is cleared
    /// only when every deletion succeeded; otherwise it is rewritten with
    /// just the failed records so the rollback can be retried.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger or fingerprint store cannot be read or
    /// written.
    pub fn rollback_last_run(&mut self) -> Result<RollbackSummary> {
        let Some(records) = self.ledger.load_last_run()? else {
            tracing::info!(path = %self.ledger.path().display(), "No previous run to roll back");
            return Ok(RollbackSummary::default());
        };

        let mut summary = RollbackSummary::default();
        let mut remaining = Vec::new();

        for record in records {
            if let Some(limiter) = &self.rate_limiter {
                limiter.throttle();
            }
            let started = Instant::now();
            match self
                .gateway
                .delete_worklog(&record.issue_key, &record.worklog_id)
            {
                Ok(()) => {
                    let elapsed = started.elapsed();
                    summary.deleted += 1;
                    tracing::info!(
                        issue = %record.issue_key,
                        worklog_id = %record.worklog_id,
                        elapsed_ms = elapsed.as_millis(),
                        "Deleted worklog"
                    );
                    if let Some(hook) = self.on_rollback.as_mut() {
                        hook(&record.issue_key, &record.worklog_id, elapsed);
                    }
                    if let (Some(store), Some(fingerprint)) =
                        (self.store.as_mut(), record.fingerprint.as_deref())
                    {
                        if store.remove(fingerprint) {
                            summary.hashes_cleared += 1;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        issue = %record.issue_key,
                        worklog_id = %record.worklog_id,
                        error = %e,
                        "Failed to delete worklog"
                    );
                    summary.errors.push(RollbackFailure {
                        issue_key: record.issue_key.clone(),
                        worklog_id: record.worklog_id.clone(),
                        error: e.to_string(),
                    });
                    remaining.push(record);
                }
            }
        }

        if remaining.is_empty() {
            self.ledger.clear()?;
        } else {
            self.ledger.save_run(&remaining)?;
        }
        if let Some(store) = self.store.as_mut() {
            store.save()?;
        }

        Ok(summary)
    }
}

impl<G> fmt::Debug for RollbackExecutor<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RollbackExecutor")
            .field("ledger", &self.ledger)
            .field("store", &self.store.as_ref().map(FingerprintStore::path))
            .finish_non_exhaustive()
    }
}
