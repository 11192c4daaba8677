//! Output formatting for `jwi`.
//!
//! Human-readable text for the terminal and JSON for `--json`:
//! - Import summary and failed-entry listing
//! - Dry-run preview, either one line per entry or full request bodies
//! - Rollback summary

use crate::model::TimePayload;
use crate::pipeline::ImportOutcome;
use crate::report::ImportReport;
use crate::rollback::RollbackSummary;
use serde_json::{Value, json};

/// Comment characters shown in the one-line dry-run preview.
pub const PREVIEW_COMMENT_LEN: usize = 50;

const GREEN: &str = "32";
const YELLOW: &str = "33";
const RED: &str = "31";
const CYAN: &str = "36";

/// Text formatting switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    pub use_color: bool,
    pub verbose: bool,
}

fn paint(text: &str, code: &str, use_color: bool) -> String {
    if use_color {
        format!("\x1b[{code}m{text}\x1b[0m")
    } else {
        text.to_string()
    }
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push('\n');
}

/// Cut `text` to `max_chars` characters, appending `...` when shortened.
#[must_use]
pub fn truncate_comment(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}

/// Bucket counts, one per line.
#[must_use]
pub fn render_summary(report: &ImportReport, options: RenderOptions) -> String {
    let summary = report.summary();
    let mut out = String::new();
    push_line(&mut out, &paint("--- Summary ---", GREEN, options.use_color));
    push_line(
        &mut out,
        &paint(&format!("Imported: {}", summary.imported), GREEN, options.use_color),
    );
    push_line(
        &mut out,
        &paint(&format!("Skipped: {}", summary.skipped), YELLOW, options.use_color),
    );
    let failed = format!("Failed: {}", summary.failed);
    if summary.failed > 0 {
        push_line(&mut out, &paint(&failed, RED, options.use_color));
    } else {
        push_line(&mut out, &failed);
    }
    if report.excluded_by_date() > 0 {
        push_line(
            &mut out,
            &format!("Excluded by date: {}", report.excluded_by_date()),
        );
    }
    out
}

/// `KEY: 3600s - comment` for one previewed entry.
#[must_use]
pub fn preview_line(outcome: &ImportOutcome) -> Option<String> {
    let payload = outcome.payload.as_ref()?;
    let time = match &payload.time {
        TimePayload::Seconds(seconds) => format!("{seconds}s"),
        TimePayload::Raw(text) => text.clone(),
    };
    Some(format!(
        "{}: {time} - {}",
        outcome.entry.issue_key(),
        truncate_comment(outcome.entry.comment(), PREVIEW_COMMENT_LEN)
    ))
}

/// What a dry run would have sent.
///
/// Verbose mode prints each request with its URL and body; `worklog_url`
/// resolves the target for an issue key. Credentials are never printed.
#[must_use]
pub fn render_dry_run(
    outcomes: &[ImportOutcome],
    options: RenderOptions,
    worklog_url: impl Fn(&str) -> Option<String>,
) -> String {
    let previews: Vec<&ImportOutcome> = outcomes
        .iter()
        .filter(|o| o.dry_run && o.payload.is_some())
        .collect();
    if previews.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    if options.verbose {
        for (idx, outcome) in previews.iter().enumerate() {
            let Some(payload) = &outcome.payload else {
                continue;
            };
            let url = worklog_url(outcome.entry.issue_key()).unwrap_or_else(|| "(unknown)".to_string());
            let body = serde_json::to_string_pretty(payload).unwrap_or_default();
            out.push('\n');
            push_line(
                &mut out,
                &paint(&format!("--- Dry-run request {} ---", idx + 1), CYAN, options.use_color),
            );
            push_line(&mut out, &format!("  URL:     {url}"));
            push_line(&mut out, "  Method:  POST");
            push_line(&mut out, "  Authorization: Basic [REDACTED]");
            push_line(&mut out, "  Body:");
            push_line(&mut out, &body);
        }
    } else {
        out.push('\n');
        push_line(&mut out, &paint("Would send to Jira:", CYAN, options.use_color));
        for line in previews.iter().filter_map(|o| preview_line(o)) {
            push_line(&mut out, &format!("  {line}"));
        }
    }
    out
}

/// Failed entries with their errors.
#[must_use]
pub fn render_failed(report: &ImportReport, options: RenderOptions) -> String {
    if report.failed().is_empty() {
        return String::new();
    }
    let mut out = String::new();
    out.push('\n');
    push_line(&mut out, &paint("Failed entries:", RED, options.use_color));
    for failed in report.failed() {
        let line = failed
            .entry
            .source_row()
            .map_or_else(String::new, |row| format!("line {}: ", row.line));
        push_line(&mut out, &format!("  {line}{}: {}", failed.entry, failed.error));
    }
    out
}

/// Warning for a run whose rollback ledger could not be written, listing
/// the worklogs that now exist on the tracker.
#[must_use]
pub fn render_ledger_warning(report: &ImportReport, options: RenderOptions) -> String {
    let Some(error) = report.ledger_error() else {
        return String::new();
    };
    let mut out = String::new();
    out.push('\n');
    push_line(
        &mut out,
        &paint(
            &format!("Rollback data was not saved: {error}"),
            RED,
            options.use_color,
        ),
    );
    push_line(&mut out, "Created worklogs:");
    for imported in report.imported() {
        if let Some(id) = &imported.worklog_id {
            push_line(&mut out, &format!("  {} {id}", imported.entry.issue_key()));
        }
    }
    out
}

/// Full text output of an import run.
#[must_use]
pub fn render_import(
    report: &ImportReport,
    outcomes: &[ImportOutcome],
    options: RenderOptions,
    worklog_url: impl Fn(&str) -> Option<String>,
) -> String {
    let mut out = render_summary(report, options);
    out.push_str(&render_dry_run(outcomes, options, worklog_url));
    if options.verbose {
        out.push_str(&render_failed(report, options));
    }
    out.push_str(&render_ledger_warning(report, options));
    out
}

/// Report serialization plus dry-run payloads.
#[must_use]
pub fn import_json(report: &ImportReport, outcomes: &[ImportOutcome]) -> Value {
    let mut value = report.to_json_value();
    let previews: Vec<&ImportOutcome> = outcomes.iter().filter(|o| o.dry_run).collect();
    if !previews.is_empty() {
        if let Value::Object(map) = &mut value {
            map.insert("dry_run".to_string(), json!(previews));
        }
    }
    value
}

/// Deleted count followed by one line per failed deletion.
#[must_use]
pub fn render_rollback(summary: &RollbackSummary, options: RenderOptions) -> String {
    let mut out = String::new();
    push_line(
        &mut out,
        &paint(
            &format!("Deleted {} worklog(s).", summary.deleted),
            GREEN,
            options.use_color,
        ),
    );
    if summary.hashes_cleared > 0 {
        push_line(
            &mut out,
            &format!("Cleared {} local fingerprint(s).", summary.hashes_cleared),
        );
    }
    for failure in &summary.errors {
        push_line(
            &mut out,
            &paint(
                &format!(
                    "  Error: {} {}: {}",
                    failure.issue_key, failure.worklog_id, failure.error
                ),
                RED,
                options.use_color,
            ),
        );
    }
    out
}
