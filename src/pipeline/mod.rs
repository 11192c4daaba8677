//! Import pipeline.
//!
//! Turns source rows into worklogs on the tracker:
//!
//! 1. read and map rows
//! 2. drop entries outside the optional date range (counted, not reported)
//! 3. validate every entry
//! 4. fetch existing import tags once per distinct valid issue key
//! 5. in source order: record invalid entries, skip duplicates, then
//!    throttle, build the payload and submit it through the retry policy
//! 6. persist the rollback ledger when anything was created
//!
//! Entries are processed strictly in order. A failing entry never stops the
//! run; only configuration and source errors do.

use crate::config::Config;
use crate::dedup::{self, FingerprintStore};
use crate::error::{Result, WorklogError};
use crate::http::{RateLimiter, RetryPolicy};
use crate::mapping::WorklogMapper;
use crate::model::{RollbackRecord, SourceRow, WorklogEntry, WorklogPayload};
use crate::report::{ImportReport, REASON_DUPLICATE};
use crate::rollback::RollbackLedger;
use crate::source::SourceReader;
use crate::tracker::WorklogGateway;
use crate::util::time::format_started;
use crate::validation::{ValidationFailure, ValidatorChain};
use chrono::NaiveDate;
use chrono_tz::Tz;
use indicatif::ProgressBar;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Failure text for entries left unprocessed after cancellation.
pub const CANCELLED: &str = "cancelled";

/// Per-run switches.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub dry_run: bool,
    /// Inclusive lower bound on the entry's calendar date.
    pub start_date: Option<NaiveDate>,
    /// Inclusive upper bound on the entry's calendar date.
    pub end_date: Option<NaiveDate>,
    /// Embed import tags and skip entries whose tag is already present.
    pub deduplicate: bool,
    /// Zone for `started`; `None` keeps each date's own offset.
    pub timezone: Option<Tz>,
}

impl PipelineOptions {
    /// # Errors
    ///
    /// Returns a config error if the start date is after the end date.
    pub fn check_date_range(&self) -> Result<()> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(WorklogError::Config(format!(
                    "start date {start} is after end date {end}"
                )));
            }
        }
        Ok(())
    }

    fn has_date_range(&self) -> bool {
        self.start_date.is_some() || self.end_date.is_some()
    }

    fn in_range(&self, entry: &WorklogEntry) -> bool {
        let Some(day) = entry.date().map(chrono::DateTime::date_naive) else {
            return false;
        };
        self.start_date.is_none_or(|start| day >= start)
            && self.end_date.is_none_or(|end| day <= end)
    }
}

/// What happened to one submitted or previewed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportOutcome {
    pub entry: WorklogEntry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<WorklogPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worklog_id: Option<String>,
    pub dry_run: bool,
}

/// Called after each created worklog with the submit time.
pub type ImportHook = Box<dyn FnMut(&WorklogEntry, &str, Duration)>;

/// Orchestrates one import run against a `WorklogGateway`.
pub struct ImportPipeline<G> {
    gateway: G,
    reader: Option<SourceReader>,
    mapper: WorklogMapper,
    validators: ValidatorChain,
    rate_limiter: RateLimiter,
    retry: RetryPolicy,
    ledger: Option<RollbackLedger>,
    store: Option<FingerprintStore>,
    options: PipelineOptions,
    cancel: Arc<AtomicBool>,
    on_import: Option<ImportHook>,
    progress: Option<ProgressBar>,
    report: ImportReport,
}

impl<G: WorklogGateway> ImportPipeline<G> {
    /// A pipeline with no throttling, no retries and no ledger.
    #[must_use]
    pub fn new(gateway: G, mapper: WorklogMapper, validators: ValidatorChain) -> Self {
        Self {
            gateway,
            reader: None,
            mapper,
            validators,
            rate_limiter: RateLimiter::unlimited(),
            retry: RetryPolicy::none(),
            ledger: None,
            store: None,
            options: PipelineOptions::default(),
            cancel: Arc::new(AtomicBool::new(false)),
            on_import: None,
            progress: None,
            report: ImportReport::new(),
        }
    }

    /// Wire every collaborator from configuration.
    ///
    /// `options.deduplicate` and `options.timezone` are taken from `config`.
    ///
    /// # Errors
    ///
    /// Returns a config error for an invalid delimiter, encoding, issue key
    /// pattern, timezone or date range.
    pub fn from_config(gateway: G, config: &Config, options: PipelineOptions) -> Result<Self> {
        let options = PipelineOptions {
            deduplicate: config.deduplication.enabled,
            timezone: config.time.tz()?,
            ..options
        };
        options.check_date_range()?;

        let store = if config.deduplication.enabled {
            config
                .deduplication
                .store_path
                .as_ref()
                .map(FingerprintStore::load)
        } else {
            None
        };

        let mut pipeline = Self::new(
            gateway,
            WorklogMapper::new(&config.mapping, &config.time),
            ValidatorChain::from_config(&config.validation)?,
        )
        .with_reader(SourceReader::new(&config.csv)?)
        .with_rate_limiter(RateLimiter::new(config.rate_limit.requests_per_second))
        .with_retry(RetryPolicy::new(
            config.rate_limit.max_retries,
            config.rate_limit.backoff_base,
        ))
        .with_ledger(RollbackLedger::new(&config.rollback.path))
        .with_options(options);
        pipeline.store = store;
        Ok(pipeline)
    }

    #[must_use]
    pub fn with_reader(mut self, reader: SourceReader) -> Self {
        self.reader = Some(reader);
        self
    }

    #[must_use]
    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_ledger(mut self, ledger: RollbackLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    #[must_use]
    pub fn with_store(mut self, store: FingerprintStore) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    #[must_use]
    pub fn on_import(
        mut self,
        hook: impl FnMut(&WorklogEntry, &str, Duration) + 'static,
    ) -> Self {
        self.on_import = Some(Box::new(hook));
        self
    }

    /// Flag that stops the run between entries when set.
    #[must_use]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    #[must_use]
    pub const fn options(&self) -> &PipelineOptions {
        &self.options
    }

    #[must_use]
    pub const fn report(&self) -> &ImportReport {
        &self.report
    }

    #[must_use]
    pub fn into_report(self) -> ImportReport {
        self.report
    }

    /// Read `locator` and import its rows.
    ///
    /// # Errors
    ///
    /// Returns an error if no reader is configured, the source cannot be
    /// read, the date range is inverted, or the ledger cannot be written.
    pub fn run(&mut self, locator: &str) -> Result<Vec<ImportOutcome>> {
        self.options.check_date_range()?;
        let reader = self
            .reader
            .as_ref()
            .ok_or_else(|| WorklogError::Config("No source reader configured".to_string()))?;
        let rows = reader.read(locator)?;
        self.run_rows(&rows)
    }

    /// Import already-read rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the date range is inverted. A ledger that cannot
    /// be written is recorded on the report instead.
    pub fn run_rows(&mut self, rows: &[SourceRow]) -> Result<Vec<ImportOutcome>> {
        self.options.check_date_range()?;
        self.report = ImportReport::new();

        let entries = self.filter_by_date(self.mapper.map_all(rows));
        let checked: Vec<(WorklogEntry, std::result::Result<(), ValidationFailure>)> = entries
            .into_iter()
            .map(|entry| {
                let result = self.validators.validate(&entry);
                (entry, result)
            })
            .collect();

        let lookups = if self.options.deduplicate {
            let keys = distinct_valid_keys(&checked);
            self.fetch_existing_tags(&keys)
        } else {
            TagLookups::default()
        };

        if let Some(progress) = &self.progress {
            progress.set_length(checked.len() as u64);
        }

        let mut outcomes = Vec::new();
        let mut created = Vec::new();
        let mut cancelled = 0usize;

        for (entry, validation) in checked {
            if self.cancel.load(Ordering::SeqCst) {
                self.report.add_failed(entry, CANCELLED);
                cancelled += 1;
                continue;
            }
            self.process_entry(entry, validation, &lookups, &mut outcomes, &mut created);
            if let Some(progress) = &self.progress {
                progress.inc(1);
            }
        }

        if cancelled > 0 {
            tracing::warn!(remaining = cancelled, "Import cancelled");
        }

        self.finish(&created);
        Ok(outcomes)
    }

    fn filter_by_date(&mut self, entries: Vec<WorklogEntry>) -> Vec<WorklogEntry> {
        if !self.options.has_date_range() {
            return entries;
        }
        let before = entries.len();
        let kept: Vec<WorklogEntry> = entries
            .into_iter()
            .filter(|entry| self.options.in_range(entry))
            .collect();
        let excluded = before - kept.len();
        self.report.set_excluded_by_date(excluded);
        tracing::info!(
            excluded,
            start = ?self.options.start_date,
            end = ?self.options.end_date,
            "Filtered entries by date range"
        );
        kept
    }

    fn fetch_existing_tags(&self, issue_keys: &[String]) -> TagLookups {
        let mut lookups = TagLookups::default();
        for key in issue_keys {
            self.rate_limiter.throttle();
            match self.retry.run(|| self.gateway.existing_import_tags(key)) {
                Ok(tags) => {
                    tracing::debug!(issue = %key, tags = tags.len(), "Fetched existing import tags");
                    lookups.tags.insert(key.clone(), tags);
                }
                Err(e) => {
                    tracing::warn!(issue = %key, error = %e, "Could not fetch existing worklogs; treating issue as untagged");
                    lookups.failed.insert(key.clone());
                }
            }
        }
        lookups
    }

    fn is_duplicate(&self, entry: &WorklogEntry, lookups: &TagLookups) -> bool {
        if !self.options.deduplicate {
            return false;
        }
        let key = entry.issue_key();
        if let Some(tags) = lookups.tags.get(key) {
            return tags.contains(&dedup::import_tag(entry));
        }
        lookups.failed.contains(key)
            && self
                .store
                .as_ref()
                .is_some_and(|store| store.contains(&dedup::fingerprint(entry)))
    }

    fn process_entry(
        &mut self,
        entry: WorklogEntry,
        validation: std::result::Result<(), ValidationFailure>,
        lookups: &TagLookups,
        outcomes: &mut Vec<ImportOutcome>,
        created: &mut Vec<RollbackRecord>,
    ) {
        if let Err(failure) = validation {
            tracing::info!(
                entry = %entry,
                validator = %failure.validator,
                reason = %failure.reason,
                "Entry failed validation"
            );
            self.report.add_invalid(entry, &failure);
            return;
        }

        if self.is_duplicate(&entry, lookups) {
            tracing::info!(entry = %entry, "Skipping duplicate entry");
            self.report.add_skipped(entry, REASON_DUPLICATE);
            return;
        }

        let payload = match self.build_payload(&entry) {
            Ok(payload) => payload,
            Err(reason) => {
                self.report.add_failed(entry, reason);
                return;
            }
        };

        if self.options.dry_run {
            self.report.add_imported(entry.clone(), None);
            outcomes.push(ImportOutcome {
                entry,
                payload: Some(payload),
                worklog_id: None,
                dry_run: true,
            });
            return;
        }

        self.rate_limiter.throttle();
        let started = Instant::now();
        let result = self
            .retry
            .run(|| self.gateway.create_worklog(entry.issue_key(), &payload));
        let elapsed = started.elapsed();

        match result {
            Ok(worklog_id) => {
                tracing::info!(
                    issue = %entry.issue_key(),
                    worklog_id = %worklog_id,
                    elapsed_ms = elapsed.as_millis(),
                    "Created worklog"
                );
                let mut record = RollbackRecord::new(entry.issue_key(), worklog_id.clone());
                if let Some(store) = self.store.as_mut() {
                    let fingerprint = dedup::fingerprint(&entry);
                    store.insert(fingerprint.clone());
                    record = record.with_fingerprint(fingerprint);
                }
                created.push(record);

                if let Some(hook) = self.on_import.as_mut() {
                    hook(&entry, &worklog_id, elapsed);
                }
                self.report.add_imported(entry.clone(), Some(worklog_id.clone()));
                outcomes.push(ImportOutcome {
                    entry,
                    payload: Some(payload),
                    worklog_id: Some(worklog_id),
                    dry_run: false,
                });
            }
            Err(e) => {
                tracing::warn!(entry = %entry, error = %e, "Failed to create worklog");
                self.report.add_failed(entry, e.to_string());
            }
        }
    }

    /// Request body for an entry.
    ///
    /// # Errors
    ///
    /// Returns the failure text if the entry has no date.
    pub fn build_payload(&self, entry: &WorklogEntry) -> std::result::Result<WorklogPayload, String> {
        let date = entry.date().ok_or_else(|| "Date is missing".to_string())?;
        let comment = if self.options.deduplicate {
            dedup::embed_tag(entry.comment(), &dedup::import_tag(entry))
        } else {
            entry.comment().to_string()
        };
        Ok(WorklogPayload {
            time: self.mapper.time_payload_for(entry.time_spent()),
            started: format_started(date, self.options.timezone.as_ref()),
            comment,
        })
    }

    fn finish(&mut self, created: &[RollbackRecord]) {
        let summary = self.report.summary();
        tracing::info!(
            imported = summary.imported,
            skipped = summary.skipped,
            failed = summary.failed,
            excluded_by_date = self.report.excluded_by_date(),
            dry_run = self.options.dry_run,
            "Import finished"
        );

        if self.options.dry_run || created.is_empty() {
            return;
        }

        if let Some(store) = self.store.as_mut() {
            if let Err(e) = store.save() {
                tracing::warn!(path = %store.path().display(), error = %e, "Failed to save fingerprint store");
            }
        }
        if let Some(ledger) = &self.ledger {
            match ledger.save_run(created) {
                Ok(()) => {
                    tracing::info!(path = %ledger.path().display(), records = created.len(), "Saved rollback ledger");
                }
                Err(e) => {
                    tracing::warn!(
                        path = %ledger.path().display(),
                        records = created.len(),
                        error = %e,
                        "Failed to save rollback ledger"
                    );
                    self.report.set_ledger_error(e.to_string());
                }
            }
        }
    }
}

impl<G> fmt::Debug for ImportPipeline<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportPipeline")
            .field("mapper", &self.mapper)
            .field("validators", &self.validators)
            .field("retry", &self.retry)
            .field("ledger", &self.ledger)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct TagLookups {
    tags: HashMap<String, HashSet<String>>,
    failed: HashSet<String>,
}

fn distinct_valid_keys(
    checked: &[(WorklogEntry, std::result::Result<(), ValidationFailure>)],
) -> Vec<String> {
    let mut seen = HashSet::new();
    checked
        .iter()
        .filter(|(_, result)| result.is_ok())
        .map(|(entry, _)| entry.issue_key())
        .filter(|key| seen.insert(*key))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnMapping, TimeConfig};
    use crate::model::{RemoteWorklog, TimePayload};
    use crate::tracker::TrackerError;
    use crate::validation::{DateValidator, DurationValidator, IssueKeyValidator};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Default)]
    struct FakeGateway {
        remote: RefCell<HashMap<String, Vec<RemoteWorklog>>>,
        created: RefCell<Vec<(String, WorklogPayload)>>,
        list_calls: RefCell<Vec<String>>,
        fail_create: Cell<Option<u16>>,
        fail_list: bool,
        next_id: Cell<u64>,
    }

    impl WorklogGateway for FakeGateway {
        fn issue_exists(&self, _issue_key: &str) -> bool {
            true
        }

        fn create_worklog(
            &self,
            issue_key: &str,
            payload: &WorklogPayload,
        ) -> std::result::Result<String, TrackerError> {
            if let Some(status) = self.fail_create.get() {
                return Err(TrackerError::Status {
                    status,
                    body: "nope".to_string(),
                });
            }
            self.next_id.set(self.next_id.get() + 1);
            let id = (1000 + self.next_id.get()).to_string();
            self.created
                .borrow_mut()
                .push((issue_key.to_string(), payload.clone()));
            self.remote
                .borrow_mut()
                .entry(issue_key.to_string())
                .or_default()
                .push(RemoteWorklog {
                    id: id.clone(),
                    comment: Some(serde_json::Value::String(payload.comment.clone())),
                });
            Ok(id)
        }

        fn get_worklogs(
            &self,
            issue_key: &str,
        ) -> std::result::Result<Vec<RemoteWorklog>, TrackerError> {
            self.list_calls.borrow_mut().push(issue_key.to_string());
            if self.fail_list {
                return Err(TrackerError::Status {
                    status: 403,
                    body: String::new(),
                });
            }
            Ok(self
                .remote
                .borrow()
                .get(issue_key)
                .cloned()
                .unwrap_or_default())
        }

        fn delete_worklog(
            &self,
            _issue_key: &str,
            _worklog_id: &str,
        ) -> std::result::Result<(), TrackerError> {
            Ok(())
        }
    }

    fn row(line: usize, key: &str, date: &str, spent: &str, comment: &str) -> SourceRow {
        SourceRow::new(
            line,
            vec![
                ("Issue Key".to_string(), key.to_string()),
                ("Date".to_string(), date.to_string()),
                ("Time Spent".to_string(), spent.to_string()),
                ("Comment".to_string(), comment.to_string()),
            ],
        )
    }

    fn validators() -> ValidatorChain {
        ValidatorChain::new(vec![
            Box::new(IssueKeyValidator::default()),
            Box::new(DurationValidator),
            Box::new(DateValidator::default().with_today(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap())),
        ])
    }

    fn pipeline(gateway: &FakeGateway, options: PipelineOptions) -> ImportPipeline<&FakeGateway> {
        ImportPipeline::new(
            gateway,
            WorklogMapper::new(&ColumnMapping::default(), &TimeConfig::default()),
            validators(),
        )
        .with_options(options)
    }

    fn warsaw() -> Option<Tz> {
        "Europe/Warsaw".parse().ok()
    }

    #[test]
    fn creates_worklog_with_expected_payload() {
        let gateway = FakeGateway::default();
        let mut p = pipeline(
            &gateway,
            PipelineOptions {
                timezone: warsaw(),
                ..PipelineOptions::default()
            },
        );
        let outcomes = p.run_rows(&[row(2, "AB-1", "2025-01-10", "60", "x")]).unwrap();

        assert_eq!(outcomes.len(), 1);
        let payload = &gateway.created.borrow()[0].1;
        assert_eq!(payload.time, TimePayload::Seconds(3600));
        assert_eq!(payload.started, "2025-01-10T00:00:00.000+0100");
        assert_eq!(payload.comment, "x");
        assert_eq!(outcomes[0].worklog_id.as_deref(), Some("1001"));
        assert_eq!(p.report().summary().imported, 1);
    }

    #[test]
    fn dedup_embeds_tag_and_skips_on_second_run() {
        let gateway = FakeGateway::default();
        let options = PipelineOptions {
            deduplicate: true,
            timezone: warsaw(),
            ..PipelineOptions::default()
        };
        let rows = [row(2, "AB-1", "2025-01-10", "60", "x")];

        pipeline(&gateway, options.clone()).run_rows(&rows).unwrap();
        let comment = gateway.created.borrow()[0].1.comment.clone();
        let entry = WorklogEntry::new(
            "AB-1",
            crate::util::time::parse_entry_date("2025-01-10", "%Y-%m-%d"),
            "60",
            "x",
        );
        assert_eq!(
            comment,
            format!("x\n\n[mudd-import-id:{}]", dedup::import_tag(&entry))
        );

        let mut second = pipeline(&gateway, options);
        second.run_rows(&rows).unwrap();
        assert_eq!(gateway.created.borrow().len(), 1);
        assert_eq!(second.report().summary().skipped, 1);
        assert_eq!(second.report().skipped()[0].reason, "duplicate");
    }

    #[test]
    fn tags_are_fetched_once_per_distinct_valid_key() {
        let gateway = FakeGateway::default();
        let mut p = pipeline(
            &gateway,
            PipelineOptions {
                deduplicate: true,
                ..PipelineOptions::default()
            },
        );
        p.run_rows(&[
            row(2, "AB-1", "2025-01-10", "60", "a"),
            row(3, "AB-1", "2025-01-11", "60", "b"),
            row(4, "CD-2", "2025-01-11", "60", "c"),
            row(5, "bad", "2025-01-11", "60", "d"),
        ])
        .unwrap();
        assert_eq!(*gateway.list_calls.borrow(), vec!["AB-1", "CD-2"]);
    }

    #[test]
    fn invalid_entries_fail_without_remote_calls() {
        let gateway = FakeGateway::default();
        let mut p = pipeline(&gateway, PipelineOptions::default());
        p.run_rows(&[
            row(2, "bad", "2025-01-10", "0", "x"),
            row(3, "AB-1", "2025-01-10", "60", "ok"),
        ])
        .unwrap();

        let failed = p.report().failed();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].error, "Invalid issue key: \"bad\"");
        assert_eq!(failed[0].validator.as_deref(), Some("issue_key"));
        assert_eq!(gateway.created.borrow().len(), 1);
    }

    #[test]
    fn date_range_excludes_and_counts() {
        let gateway = FakeGateway::default();
        let mut p = pipeline(
            &gateway,
            PipelineOptions {
                start_date: NaiveDate::from_ymd_opt(2025, 1, 1),
                end_date: NaiveDate::from_ymd_opt(2025, 1, 31),
                ..PipelineOptions::default()
            },
        );
        p.run_rows(&[
            row(2, "AB-1", "2025-01-31", "60", "in"),
            row(3, "AB-1", "2025-02-01", "60", "out"),
            row(4, "AB-1", "", "60", "undated"),
        ])
        .unwrap();

        let report = p.into_report();
        let summary = report.summary();
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.skipped + summary.failed, 0);
        assert_eq!(report.excluded_by_date(), 2);
    }

    #[test]
    fn inverted_date_range_is_config_error() {
        let gateway = FakeGateway::default();
        let mut p = pipeline(
            &gateway,
            PipelineOptions {
                start_date: NaiveDate::from_ymd_opt(2025, 2, 1),
                end_date: NaiveDate::from_ymd_opt(2025, 1, 1),
                ..PipelineOptions::default()
            },
        );
        let err = p.run_rows(&[row(2, "AB-1", "2025-01-10", "60", "x")]).unwrap_err();
        assert!(matches!(err, WorklogError::Config(_)));
        assert!(gateway.created.borrow().is_empty());
    }

    #[test]
    fn dry_run_previews_without_creating() {
        let gateway = FakeGateway::default();
        let temp = tempfile::TempDir::new().unwrap();
        let ledger = RollbackLedger::new(temp.path().join("ledger.json"));
        let mut p = pipeline(
            &gateway,
            PipelineOptions {
                dry_run: true,
                ..PipelineOptions::default()
            },
        )
        .with_ledger(ledger.clone());

        let outcomes = p.run_rows(&[row(2, "AB-1", "2025-01-10", "90", "x")]).unwrap();
        assert!(outcomes[0].dry_run);
        assert_eq!(
            outcomes[0].payload.as_ref().map(|p| p.time.clone()),
            Some(TimePayload::Seconds(5400))
        );
        assert!(gateway.created.borrow().is_empty());
        assert!(p.report().imported()[0].worklog_id.is_none());
        assert!(!ledger.path().exists());
    }

    #[test]
    fn remote_errors_fail_entry_and_are_not_ledgered() {
        let gateway = FakeGateway::default();
        gateway.fail_create.set(Some(400));
        let temp = tempfile::TempDir::new().unwrap();
        let ledger = RollbackLedger::new(temp.path().join("ledger.json"));
        let mut p = pipeline(&gateway, PipelineOptions::default()).with_ledger(ledger.clone());

        p.run_rows(&[row(2, "AB-1", "2025-01-10", "60", "x")]).unwrap();
        assert_eq!(p.report().failed()[0].error, "HTTP 400: nope");
        assert!(!ledger.path().exists());
    }

    #[test]
    fn ledger_records_created_worklogs() {
        let gateway = FakeGateway::default();
        let temp = tempfile::TempDir::new().unwrap();
        let ledger = RollbackLedger::new(temp.path().join("ledger.json"));
        let mut p = pipeline(&gateway, PipelineOptions::default()).with_ledger(ledger.clone());
        p.run_rows(&[
            row(2, "AB-1", "2025-01-10", "60", "x"),
            row(3, "CD-2", "2025-01-10", "30", "y"),
        ])
        .unwrap();

        let records = ledger.load_last_run().unwrap().unwrap();
        assert_eq!(
            records,
            vec![
                RollbackRecord::new("AB-1", "1001"),
                RollbackRecord::new("CD-2", "1002"),
            ]
        );
    }

    #[test]
    fn unwritable_ledger_keeps_outcomes_and_report() {
        let gateway = FakeGateway::default();
        let temp = tempfile::TempDir::new().unwrap();
        let ledger = RollbackLedger::new(temp.path());
        let mut p = pipeline(&gateway, PipelineOptions::default()).with_ledger(ledger);

        let outcomes = p
            .run_rows(&[row(2, "AB-1", "2025-01-10", "60", "x")])
            .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].worklog_id.as_deref(), Some("1001"));
        let report = p.report();
        assert_eq!(report.summary().imported, 1);
        assert_eq!(report.created_count(), 1);
        assert!(report.ledger_error().is_some());
        assert!(report.to_json_value()["ledger_error"].is_string());
    }

    #[test]
    fn cancellation_fails_remaining_entries() {
        let gateway = FakeGateway::default();
        let mut p = pipeline(&gateway, PipelineOptions::default());
        let flag = p.cancel_flag();
        let mut p = p.on_import(move |_, _, _| flag.store(true, Ordering::SeqCst));

        p.run_rows(&[
            row(2, "AB-1", "2025-01-10", "60", "a"),
            row(3, "AB-1", "2025-01-11", "60", "b"),
            row(4, "AB-1", "2025-01-12", "60", "c"),
        ])
        .unwrap();

        let summary = p.report().summary();
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.failed, 2);
        assert!(p.report().failed().iter().all(|f| f.error == CANCELLED));
    }

    #[test]
    fn import_hook_sees_created_ids() {
        let gateway = FakeGateway::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut p = pipeline(&gateway, PipelineOptions::default())
            .on_import(move |entry, id, _| sink.borrow_mut().push(format!("{}={id}", entry.issue_key())));
        p.run_rows(&[row(2, "AB-1", "2025-01-10", "60", "x")]).unwrap();
        assert_eq!(*seen.borrow(), vec!["AB-1=1001"]);
    }

    #[test]
    fn local_store_used_only_when_remote_lookup_fails() {
        let temp = tempfile::TempDir::new().unwrap();
        let store_path = temp.path().join("hashes.json");
        let rows = [row(2, "AB-1", "2025-01-10", "60", "x")];
        let entry = WorklogMapper::new(&ColumnMapping::default(), &TimeConfig::default()).map(&rows[0]);

        let mut store = FingerprintStore::load(&store_path);
        store.insert(dedup::fingerprint(&entry));
        store.save().unwrap();

        let options = PipelineOptions {
            deduplicate: true,
            ..PipelineOptions::default()
        };

        // Remote lookup works and has no tag: remote wins, entry is created.
        let gateway = FakeGateway::default();
        let mut p = pipeline(&gateway, options.clone()).with_store(FingerprintStore::load(&store_path));
        p.run_rows(&rows).unwrap();
        assert_eq!(gateway.created.borrow().len(), 1);

        // Remote lookup fails: the store marks it as a duplicate.
        let failing = FakeGateway {
            fail_list: true,
            ..FakeGateway::default()
        };
        let mut p = pipeline(&failing, options).with_store(FingerprintStore::load(&store_path));
        p.run_rows(&rows).unwrap();
        assert!(failing.created.borrow().is_empty());
        assert_eq!(p.report().summary().skipped, 1);
    }

    #[test]
    fn every_entry_lands_in_one_bucket() {
        let gateway = FakeGateway::default();
        let mut p = pipeline(&gateway, PipelineOptions::default());
        let rows: Vec<SourceRow> = (0..10)
            .map(|i| {
                let key = if i % 3 == 0 { "bad" } else { "AB-1" };
                row(i + 2, key, "2025-01-10", &format!("{}", i * 10), "c")
            })
            .collect();
        p.run_rows(&rows).unwrap();
        let s = p.report().summary();
        assert_eq!(s.imported + s.skipped + s.failed, rows.len());
    }
}
