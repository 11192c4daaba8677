//! Entry validation for `jira_worklog_import`.
//!
//! Validators are small independent checks run as an ordered chain. The
//! chain is fail-fast: the first failing validator's reason is the only one
//! reported. Failures never escape the pipeline; they land in the report's
//! failed bucket.

use crate::config::ValidationConfig;
use crate::error::{Result, WorklogError};
use crate::mapping::numeric_value;
use crate::model::WorklogEntry;
use chrono::{Local, NaiveDate};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Default issue key shape (`PROJ-123`).
pub const DEFAULT_ISSUE_KEY_PATTERN: &str = r"^[A-Z][A-Z0-9]+-\d+$";

/// Why an entry was rejected, and by which validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub reason: String,
    pub validator: String,
}

impl ValidationFailure {
    #[must_use]
    pub fn new(validator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            validator: validator.into(),
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl std::error::Error for ValidationFailure {}

/// A single check against a worklog entry.
pub trait Validator: Send + Sync {
    fn name(&self) -> &str;

    /// # Errors
    ///
    /// Returns a `ValidationFailure` if the entry violates this check.
    fn validate(&self, entry: &WorklogEntry) -> std::result::Result<(), ValidationFailure>;
}

/// Checks the issue key against a pattern.
#[derive(Debug, Clone)]
pub struct IssueKeyValidator {
    pattern: Regex,
}

impl IssueKeyValidator {
    /// # Errors
    ///
    /// Returns a config error if `pattern` is not a valid regex.
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern).map_err(|e| {
            WorklogError::Config(format!("Invalid validation.issue_key_pattern: {e}"))
        })?;
        Ok(Self { pattern })
    }
}

static DEFAULT_ISSUE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(DEFAULT_ISSUE_KEY_PATTERN).expect("default issue key pattern is valid")
});

impl Default for IssueKeyValidator {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_ISSUE_KEY.clone(),
        }
    }
}

impl Validator for IssueKeyValidator {
    fn name(&self) -> &str {
        "issue_key"
    }

    fn validate(&self, entry: &WorklogEntry) -> std::result::Result<(), ValidationFailure> {
        if self.pattern.is_match(entry.issue_key()) {
            Ok(())
        } else {
            Err(ValidationFailure::new(
                self.name(),
                format!("Invalid issue key: \"{}\"", entry.issue_key()),
            ))
        }
    }
}

/// Requires a strictly positive duration.
#[derive(Debug, Clone, Copy, Default)]
pub struct DurationValidator;

impl Validator for DurationValidator {
    fn name(&self) -> &str {
        "time_spent"
    }

    fn validate(&self, entry: &WorklogEntry) -> std::result::Result<(), ValidationFailure> {
        let raw = entry.time_spent();
        let has_digit = raw.chars().any(|c| c.is_ascii_digit());
        let negative = raw.trim_start().starts_with('-');

        if has_digit && !negative && numeric_value(raw) > 0.0 {
            Ok(())
        } else {
            Err(ValidationFailure::new(
                self.name(),
                format!("Time spent must be greater than 0: \"{raw}\""),
            ))
        }
    }
}

/// Requires a date, and by default rejects dates after today.
#[derive(Debug, Clone)]
pub struct DateValidator {
    allow_future: bool,
    today: Option<NaiveDate>,
}

impl DateValidator {
    #[must_use]
    pub const fn new(allow_future: bool) -> Self {
        Self {
            allow_future,
            today: None,
        }
    }

    /// Pin "today" instead of reading the local clock.
    #[must_use]
    pub const fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }
}

impl Default for DateValidator {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Validator for DateValidator {
    fn name(&self) -> &str {
        "date"
    }

    fn validate(&self, entry: &WorklogEntry) -> std::result::Result<(), ValidationFailure> {
        let Some(date) = entry.date() else {
            return Err(ValidationFailure::new(self.name(), "Date is missing"));
        };

        let day = date.date_naive();
        if !self.allow_future && day > self.today() {
            return Err(ValidationFailure::new(
                self.name(),
                format!("Date cannot be in the future: {}", day.format("%Y-%m-%d")),
            ));
        }
        Ok(())
    }
}

/// Ordered, fail-fast list of validators.
pub struct ValidatorChain {
    validators: Vec<Box<dyn Validator>>,
    enabled: bool,
}

impl ValidatorChain {
    #[must_use]
    pub fn new(validators: Vec<Box<dyn Validator>>) -> Self {
        Self {
            validators,
            enabled: true,
        }
    }

    /// A chain that accepts everything.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            validators: Vec::new(),
            enabled: false,
        }
    }

    /// Build the standard chain: issue key, then duration, then date.
    ///
    /// # Errors
    ///
    /// Returns a config error if the issue key pattern does not compile.
    pub fn from_config(config: &ValidationConfig) -> Result<Self> {
        if !config.enabled {
            return Ok(Self::disabled());
        }
        Ok(Self::new(vec![
            Box::new(IssueKeyValidator::new(&config.issue_key_pattern)?),
            Box::new(DurationValidator),
            Box::new(DateValidator::new(config.allow_future_dates)),
        ]))
    }

    /// Append a validator to the end of the chain.
    #[must_use]
    pub fn with(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.validators.iter().map(|v| v.name()).collect()
    }

    /// Run validators in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first validator's `ValidationFailure`.
    pub fn validate(&self, entry: &WorklogEntry) -> std::result::Result<(), ValidationFailure> {
        if !self.enabled {
            return Ok(());
        }
        for validator in &self.validators {
            validator.validate(entry)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ValidatorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorChain")
            .field("validators", &self.names())
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, FixedOffset};

    fn date(value: &str) -> Option<DateTime<FixedOffset>> {
        crate::util::time::parse_entry_date(value, "%Y-%m-%d")
    }

    fn entry(key: &str, day: &str, spent: &str) -> WorklogEntry {
        WorklogEntry::new(key, date(day), spent, "work")
    }

    #[test]
    fn default_issue_key_pattern_compiles() {
        assert_eq!(DEFAULT_ISSUE_KEY.as_str(), DEFAULT_ISSUE_KEY_PATTERN);
        let validator = IssueKeyValidator::default();
        assert!(validator.validate(&entry("AB-1", "2025-01-10", "60")).is_ok());
        assert!(validator.validate(&entry("ab-1", "2025-01-10", "60")).is_err());
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn chain() -> ValidatorChain {
        ValidatorChain::new(vec![
            Box::new(IssueKeyValidator::default()),
            Box::new(DurationValidator),
            Box::new(DateValidator::default().with_today(today())),
        ])
    }

    #[test]
    fn issue_key_default_pattern() {
        let validator = IssueKeyValidator::default();
        assert!(validator.validate(&entry("AB-1", "2025-01-10", "60")).is_ok());
        assert!(validator.validate(&entry("PROJ2-123", "2025-01-10", "60")).is_ok());

        let failure = validator
            .validate(&entry("ab-1", "2025-01-10", "60"))
            .unwrap_err();
        assert_eq!(failure.reason, "Invalid issue key: \"ab-1\"");
        assert_eq!(failure.validator, "issue_key");

        assert!(validator.validate(&entry("A-1", "2025-01-10", "60")).is_err());
        assert!(validator.validate(&entry("", "2025-01-10", "60")).is_err());
    }

    #[test]
    fn issue_key_custom_pattern() {
        let validator = IssueKeyValidator::new(r"^OPS-\d+$").unwrap();
        assert!(validator.validate(&entry("OPS-7", "2025-01-10", "60")).is_ok());
        assert!(validator.validate(&entry("AB-7", "2025-01-10", "60")).is_err());
    }

    #[test]
    fn bad_pattern_is_config_error() {
        let err = IssueKeyValidator::new("([").unwrap_err();
        assert!(matches!(err, WorklogError::Config(_)));
    }

    #[test]
    fn duration_requires_positive_number() {
        let validator = DurationValidator;
        for ok in ["60", "1.5", "2h", "1:30:00", "1h 30m"] {
            assert!(validator.validate(&entry("AB-1", "2025-01-10", ok)).is_ok(), "{ok}");
        }
        for bad in ["", "0", "0h", "abc", "-1", "0.0"] {
            let failure = validator
                .validate(&entry("AB-1", "2025-01-10", bad))
                .unwrap_err();
            assert_eq!(
                failure.reason,
                format!("Time spent must be greater than 0: \"{bad}\"")
            );
        }
    }

    #[test]
    fn date_missing_and_future() {
        let validator = DateValidator::default().with_today(today());
        assert!(validator.validate(&entry("AB-1", "2025-06-01", "60")).is_ok());

        let missing = validator.validate(&entry("AB-1", "", "60")).unwrap_err();
        assert_eq!(missing.reason, "Date is missing");

        let future = validator
            .validate(&entry("AB-1", "2025-06-02", "60"))
            .unwrap_err();
        assert_eq!(future.reason, "Date cannot be in the future: 2025-06-02");

        let permissive = DateValidator::new(true).with_today(today());
        assert!(permissive.validate(&entry("AB-1", "2030-01-01", "60")).is_ok());
    }

    #[test]
    fn chain_is_fail_fast() {
        // Bad key and bad duration: only the key failure is reported.
        let failure = chain().validate(&entry("bad", "2025-01-10", "0")).unwrap_err();
        assert_eq!(failure.validator, "issue_key");
        assert!(!failure.reason.contains("Time spent"));
    }

    #[test]
    fn disabled_chain_accepts_everything() {
        let chain = ValidatorChain::disabled();
        assert!(!chain.is_enabled());
        assert!(chain.validate(&entry("bad", "", "")).is_ok());

        let config = ValidationConfig {
            enabled: false,
            ..ValidationConfig::default()
        };
        assert!(ValidatorChain::from_config(&config)
            .unwrap()
            .validate(&entry("bad", "", ""))
            .is_ok());
    }

    #[test]
    fn from_config_orders_validators() {
        let chain = ValidatorChain::from_config(&ValidationConfig::default()).unwrap();
        assert_eq!(chain.names(), vec!["issue_key", "time_spent", "date"]);
    }
}
