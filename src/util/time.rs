//! Time and date parsing utilities.

use crate::error::{Result, WorklogError};
use chrono::{
    DateTime, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use chrono_tz::Tz;

/// Format used for the `started` field of worklog payloads.
pub const STARTED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.000%z";

/// Date formats tried after the configured one fails.
const FALLBACK_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

const FALLBACK_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d"];

/// Parse a source date cell.
///
/// Tries `format` as a date-time pattern, then as a date-only pattern, then
/// RFC3339 and a list of common layouts. Values without an explicit offset
/// are pinned to UTC. Returns `None` when nothing matches.
#[must_use]
pub fn parse_entry_date(value: &str, format: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Some(parsed) = parse_with_format(value, format) {
        return Some(parsed);
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed);
    }

    FALLBACK_DATETIME_FORMATS
        .iter()
        .chain(FALLBACK_DATE_FORMATS)
        .find_map(|candidate| parse_with_format(value, candidate))
}

fn parse_with_format(value: &str, format: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(parsed) = DateTime::parse_from_str(value, format) {
        return Some(parsed);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
        return Some(pin_to_utc(naive));
    }
    NaiveDate::parse_from_str(value, format)
        .ok()
        .map(|date| pin_to_utc(date.and_time(NaiveTime::MIN)))
}

fn pin_to_utc(naive: NaiveDateTime) -> DateTime<FixedOffset> {
    Utc.from_utc_datetime(&naive).fixed_offset()
}

/// Render the `started` timestamp for a worklog.
///
/// With a timezone, the entry's wall-clock fields are interpreted in that
/// zone (so `2025-01-10 00:00` becomes `...T00:00:00.000+0100` in Warsaw).
/// Without one, the date keeps its own offset.
#[must_use]
pub fn format_started(date: &DateTime<FixedOffset>, timezone: Option<&Tz>) -> String {
    let Some(tz) = timezone else {
        return date.format(STARTED_FORMAT).to_string();
    };

    let naive = date.naive_local();
    let localized = match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt,
        // Wall-clock time skipped by a DST transition: shift past the gap.
        LocalResult::None => tz.from_utc_datetime(&naive),
    };
    localized.format(STARTED_FORMAT).to_string()
}

/// Resolve an IANA timezone name. Blank names resolve to `None`.
///
/// # Errors
///
/// Returns a config error if the name is not a known timezone.
pub fn parse_timezone(name: &str) -> Result<Option<Tz>> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(None);
    }
    name.parse::<Tz>()
        .map(Some)
        .map_err(|_| WorklogError::Config(format!("Unknown timezone: {name}")))
}

/// Parse a `--start-date` / `--end-date` argument (`YYYY-mm-dd`).
///
/// Blank input means "not set".
///
/// # Errors
///
/// Returns `InvalidDate` if the value is not a valid `YYYY-mm-dd` date.
pub fn parse_import_date(value: Option<&str>, name: &str) -> Result<Option<NaiveDate>> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| WorklogError::InvalidDate {
            name: name.to_string(),
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn configured_date_only_format_is_midnight_utc() {
        let parsed = parse_entry_date("2025-01-10", "%Y-%m-%d").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2025-01-10T00:00:00+00:00");
    }

    #[test]
    fn configured_datetime_format_keeps_time() {
        let parsed = parse_entry_date("2026-02-10 19:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(parsed.hour(), 19);
        assert_eq!(parsed.day(), 10);
    }

    #[test]
    fn falls_back_when_configured_format_fails() {
        let parsed = parse_entry_date("10.01.2025", "%Y-%m-%d").unwrap();
        assert_eq!(parsed.month(), 1);
        assert_eq!(parsed.day(), 10);

        let parsed = parse_entry_date("2025-01-10T08:30:00+02:00", "%d.%m.%Y").unwrap();
        assert_eq!(parsed.offset().local_minus_utc(), 7200);
    }

    #[test]
    fn unparseable_date_is_none() {
        assert!(parse_entry_date("yesterday-ish", "%Y-%m-%d").is_none());
        assert!(parse_entry_date("   ", "%Y-%m-%d").is_none());
    }

    #[test]
    fn started_in_warsaw_winter_and_summer() {
        let tz: Tz = "Europe/Warsaw".parse().unwrap();
        let winter = parse_entry_date("2025-02-01 12:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(format_started(&winter, Some(&tz)), "2025-02-01T12:00:00.000+0100");

        let summer = parse_entry_date("2025-07-15 14:30:00", "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(format_started(&summer, Some(&tz)), "2025-07-15T14:30:00.000+0200");
    }

    #[test]
    fn started_without_timezone_uses_own_offset() {
        let date = parse_entry_date("2025-02-01 14:30:00", "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(format_started(&date, None), "2025-02-01T14:30:00.000+0000");
    }

    #[test]
    fn started_in_utc_zone() {
        let tz: Tz = "UTC".parse().unwrap();
        let date = parse_entry_date("2025-02-01", "%Y-%m-%d").unwrap();
        assert_eq!(format_started(&date, Some(&tz)), "2025-02-01T00:00:00.000+0000");
    }

    #[test]
    fn timezone_parsing() {
        assert!(parse_timezone("").unwrap().is_none());
        assert!(parse_timezone("Asia/Tokyo").unwrap().is_some());
        assert!(parse_timezone("Mars/Olympus").is_err());
    }

    #[test]
    fn import_date_parsing() {
        assert_eq!(parse_import_date(None, "start-date").unwrap(), None);
        assert_eq!(parse_import_date(Some("  "), "start-date").unwrap(), None);
        assert_eq!(
            parse_import_date(Some("2025-01-15"), "start-date").unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 15)
        );
        assert!(matches!(
            parse_import_date(Some("15/01/2025"), "end-date"),
            Err(WorklogError::InvalidDate { .. })
        ));
    }
}
