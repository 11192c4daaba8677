//! Row to worklog entry mapping.
//!
//! The mapper never fails: unknown columns become empty strings and
//! unparseable dates become `None`. Rejection is left to the date filter and
//! the validator chain.

use crate::config::{ColumnMapping, TimeConfig};
use crate::model::{SourceRow, TimePayload, WorklogEntry};
use crate::util::time::parse_entry_date;
use std::fmt;
use std::str::FromStr;

/// How the duration column is written in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurationFormat {
    /// Whole minutes (`90`, `90 min`).
    #[default]
    Minutes,
    /// Decimal hours (`1.5`, `2h`).
    Hours,
    /// Spreadsheet duration (`1:30:00`, `45:00`).
    ExcelDuration,
    /// Tracker-native text passed through as-is (`1h 30m`).
    Jira,
}

impl DurationFormat {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Minutes => "minutes",
            Self::Hours => "hours",
            Self::ExcelDuration => "excel_duration",
            Self::Jira => "jira",
        }
    }

    /// Parse a configured format name; unknown names fall back to minutes.
    #[must_use]
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            if !value.trim().is_empty() {
                tracing::warn!(format = value, "Unknown time_spent_format, treating as minutes");
            }
            Self::Minutes
        })
    }
}

impl fmt::Display for DurationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DurationFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "minutes" => Ok(Self::Minutes),
            "hours" => Ok(Self::Hours),
            "excel_duration" | "excel-duration" => Ok(Self::ExcelDuration),
            "jira" => Ok(Self::Jira),
            other => Err(format!(
                "Invalid time_spent_format: {other}. Must be one of: minutes, hours, excel_duration, jira"
            )),
        }
    }
}

/// Maps source rows to `WorklogEntry` values.
#[derive(Debug, Clone)]
pub struct WorklogMapper {
    columns: ColumnMapping,
    date_format: String,
    duration_format: DurationFormat,
}

impl WorklogMapper {
    #[must_use]
    pub fn new(columns: &ColumnMapping, time: &TimeConfig) -> Self {
        Self {
            columns: columns.clone(),
            date_format: time.date_format.clone(),
            duration_format: time.time_spent_format,
        }
    }

    #[must_use]
    pub const fn duration_format(&self) -> DurationFormat {
        self.duration_format
    }

    /// Map one row.
    #[must_use]
    pub fn map(&self, row: &SourceRow) -> WorklogEntry {
        let value = |column: &str| row.get(column).map(str::trim).unwrap_or_default();

        let date = parse_entry_date(value(&self.columns.date), &self.date_format);
        WorklogEntry::new(
            value(&self.columns.issue_key),
            date,
            value(&self.columns.time_spent),
            value(&self.columns.comment),
        )
        .with_source_row(row.clone())
    }

    /// Map every row, preserving order; never drops rows.
    #[must_use]
    pub fn map_all(&self, rows: &[SourceRow]) -> Vec<WorklogEntry> {
        rows.iter().map(|row| self.map(row)).collect()
    }

    /// Time field for the payload, per the configured duration format.
    #[must_use]
    pub fn time_payload_for(&self, raw: &str) -> TimePayload {
        time_payload_for(self.duration_format, raw)
    }
}

/// Convert a raw duration cell according to `format`.
#[must_use]
pub fn time_payload_for(format: DurationFormat, raw: &str) -> TimePayload {
    match format {
        DurationFormat::Minutes => TimePayload::Seconds(minutes_value(raw).saturating_mul(60)),
        DurationFormat::Hours => TimePayload::Seconds(hours_to_seconds(raw)),
        DurationFormat::ExcelDuration => TimePayload::Seconds(excel_duration_seconds(raw)),
        DurationFormat::Jira => TimePayload::Raw(raw.trim().to_string()),
    }
}

/// Numeric value of a duration cell: everything but digits and `.` is
/// stripped, then the leading decimal number is read (`"1.5h"` → 1.5).
/// Unparseable input yields 0.
#[must_use]
pub fn numeric_value(raw: &str) -> f64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    let mut seen_dot = false;
    let leading: String = cleaned
        .chars()
        .take_while(|c| {
            if *c == '.' {
                if seen_dot {
                    return false;
                }
                seen_dot = true;
            }
            true
        })
        .collect();

    leading.parse::<f64>().unwrap_or(0.0)
}

fn digits_value(raw: &str) -> u64 {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    digits.parse::<u64>().unwrap_or(0)
}

fn minutes_value(raw: &str) -> u64 {
    digits_value(raw)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn hours_to_seconds(raw: &str) -> u64 {
    let hours = numeric_value(raw);
    if hours > 0.0 && hours.is_finite() {
        (hours * 3600.0) as u64
    } else {
        0
    }
}

fn excel_duration_seconds(raw: &str) -> u64 {
    let value = raw.trim();
    if value.is_empty() {
        return 0;
    }

    let mut parts: Vec<u64> = value.split(':').map(digits_value).collect();
    // Trailing empty segments ("45:") do not count as parts.
    let trailing_empty = value.split(':').rev().take_while(|p| p.is_empty()).count();
    parts.truncate(parts.len() - trailing_empty);

    match parts.as_slice() {
        [hours, minutes, seconds] => hours
            .saturating_mul(3600)
            .saturating_add(minutes.saturating_mul(60))
            .saturating_add(*seconds),
        [minutes, seconds] => minutes.saturating_mul(60).saturating_add(*seconds),
        [seconds] => *seconds,
        _ => 0,
    }
}
