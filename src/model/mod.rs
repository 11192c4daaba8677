//! Core data types for `jira_worklog_import`.
//!
//! This module defines the fundamental types used throughout the application:
//! - `SourceRow` - One parsed row of the tabular source
//! - `WorklogEntry` - A normalized worklog intent derived from one row
//! - `TimePayload` / `WorklogPayload` - The body sent to the tracker
//! - `RemoteWorklog` - A worklog as returned by the tracker
//! - `RollbackRecord` - A created worklog remembered for rollback

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// One row of the tabular source: ordered `(column, value)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRow {
    /// 1-based line number of the record in the source (header is line 1).
    pub line: usize,
    pub cells: Vec<(String, String)>,
}

impl SourceRow {
    #[must_use]
    pub const fn new(line: usize, cells: Vec<(String, String)>) -> Self {
        Self { line, cells }
    }

    /// Value of a column, if the column exists.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }
}

/// A normalized worklog intent.
///
/// Immutable once constructed; all text fields are trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorklogEntry {
    issue_key: String,
    #[serde(serialize_with = "serialize_entry_date")]
    date: Option<DateTime<FixedOffset>>,
    time_spent: String,
    comment: String,
    #[serde(skip)]
    source_row: Option<SourceRow>,
}

impl WorklogEntry {
    #[must_use]
    pub fn new(
        issue_key: impl AsRef<str>,
        date: Option<DateTime<FixedOffset>>,
        time_spent: impl AsRef<str>,
        comment: impl AsRef<str>,
    ) -> Self {
        Self {
            issue_key: issue_key.as_ref().trim().to_string(),
            date,
            time_spent: time_spent.as_ref().trim().to_string(),
            comment: comment.as_ref().trim().to_string(),
            source_row: None,
        }
    }

    /// Attach the row this entry was mapped from.
    #[must_use]
    pub fn with_source_row(mut self, row: SourceRow) -> Self {
        self.source_row = Some(row);
        self
    }

    #[must_use]
    pub fn issue_key(&self) -> &str {
        &self.issue_key
    }

    #[must_use]
    pub const fn date(&self) -> Option<&DateTime<FixedOffset>> {
        self.date.as_ref()
    }

    #[must_use]
    pub fn time_spent(&self) -> &str {
        &self.time_spent
    }

    #[must_use]
    pub fn comment(&self) -> &str {
        &self.comment
    }

    #[must_use]
    pub const fn source_row(&self) -> Option<&SourceRow> {
        self.source_row.as_ref()
    }

    /// Canonical string form of the date (`2025-01-10T00:00:00+00:00`), or
    /// an empty string when the date is missing.
    #[must_use]
    pub fn date_string(&self) -> String {
        self.date.as_ref().map_or_else(String::new, format_entry_date)
    }
}

impl fmt::Display for WorklogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {:?}",
            self.issue_key,
            self.date_string(),
            self.time_spent,
            self.comment
        )
    }
}

fn format_entry_date(date: &DateTime<FixedOffset>) -> String {
    date.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

#[allow(clippy::ref_option)]
fn serialize_entry_date<S: Serializer>(
    date: &Option<DateTime<FixedOffset>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match date {
        Some(date) => serializer.serialize_str(&format_entry_date(date)),
        None => serializer.serialize_none(),
    }
}

/// Time field of a worklog payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimePayload {
    /// Converted duration (`timeSpentSeconds`).
    #[serde(rename = "timeSpentSeconds")]
    Seconds(u64),
    /// Tracker-native duration text such as `1h 30m` (`timeSpent`).
    #[serde(rename = "timeSpent")]
    Raw(String),
}

impl fmt::Display for TimePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seconds(seconds) => write!(f, "{seconds}s"),
            Self::Raw(text) => f.write_str(text),
        }
    }
}

/// Request body for creating a worklog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorklogPayload {
    #[serde(flatten)]
    pub time: TimePayload,
    pub started: String,
    pub comment: String,
}

/// A worklog as listed by the tracker.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteWorklog {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub comment: Option<Value>,
}

impl RemoteWorklog {
    /// Comment text; rich-text documents are flattened to their JSON form,
    /// which still contains any embedded import tag verbatim.
    #[must_use]
    pub fn comment_text(&self) -> String {
        match &self.comment {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }
}

/// Accept ids as JSON strings or numbers.
///
/// # Errors
///
/// Returns an error if the value is neither a string nor a number.
pub fn deserialize_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(id) => Ok(id),
        Value::Number(id) => Ok(id.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

/// A worklog created by an import run, kept so the run can be undone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackRecord {
    pub issue_key: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub worklog_id: String,
    #[serde(default, alias = "hash", skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl RollbackRecord {
    #[must_use]
    pub fn new(issue_key: impl Into<String>, worklog_id: impl Into<String>) -> Self {
        Self {
            issue_key: issue_key.into(),
            worklog_id: worklog_id.into(),
            fingerprint: None,
        }
    }

    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn utc_midnight(y: i32, m: u32, d: u32) -> DateTime<FixedOffset> {
        let naive = NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        FixedOffset::east_opt(0)
            .unwrap()
            .from_local_datetime(&naive)
            .unwrap()
    }

    #[test]
    fn entry_trims_text_fields() {
        let entry = WorklogEntry::new("  AB-1 ", None, " 60 ", "  work  ");
        assert_eq!(entry.issue_key(), "AB-1");
        assert_eq!(entry.time_spent(), "60");
        assert_eq!(entry.comment(), "work");
        assert_eq!(entry.date_string(), "");
    }

    #[test]
    fn date_string_includes_offset() {
        let entry = WorklogEntry::new("AB-1", Some(utc_midnight(2025, 1, 10)), "60", "x");
        assert_eq!(entry.date_string(), "2025-01-10T00:00:00+00:00");
    }

    #[test]
    fn entry_serializes_without_source_row() {
        let row = SourceRow::new(2, vec![("Issue Key".to_string(), "AB-1".to_string())]);
        let entry =
            WorklogEntry::new("AB-1", Some(utc_midnight(2025, 1, 10)), "60", "x").with_source_row(row);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["issue_key"], "AB-1");
        assert_eq!(json["date"], "2025-01-10T00:00:00+00:00");
        assert!(json.get("source_row").is_none());
    }

    #[test]
    fn payload_flattens_time_field() {
        let payload = WorklogPayload {
            time: TimePayload::Seconds(3600),
            started: "2025-01-10T00:00:00.000+0100".to_string(),
            comment: "x".to_string(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["timeSpentSeconds"], 3600);
        assert!(json.get("timeSpent").is_none());

        let raw = WorklogPayload {
            time: TimePayload::Raw("1h 30m".to_string()),
            ..payload
        };
        let json = serde_json::to_value(&raw).unwrap();
        assert_eq!(json["timeSpent"], "1h 30m");
    }

    #[test]
    fn remote_worklog_accepts_numeric_id_and_rich_comment() {
        let worklog: RemoteWorklog = serde_json::from_str(
            r#"{"id": 10042, "comment": {"type": "doc", "content": [{"text": "[mudd-import-id:abc12345]"}]}}"#,
        )
        .unwrap();
        assert_eq!(worklog.id, "10042");
        assert!(worklog.comment_text().contains("[mudd-import-id:abc12345]"));
    }

    #[test]
    fn rollback_record_reads_legacy_hash_key() {
        let record: RollbackRecord =
            serde_json::from_str(r#"{"issue_key": "AB-1", "worklog_id": 5, "hash": "ff"}"#).unwrap();
        assert_eq!(record.worklog_id, "5");
        assert_eq!(record.fingerprint.as_deref(), Some("ff"));
    }

    #[test]
    fn source_row_lookup() {
        let row = SourceRow::new(
            3,
            vec![
                ("Issue Key".to_string(), "AB-1".to_string()),
                ("Comment".to_string(), "hello".to_string()),
            ],
        );
        assert_eq!(row.get("Comment"), Some("hello"));
        assert_eq!(row.get("Missing"), None);
    }
}
