//! Duplicate detection by content fingerprint.
//!
//! Each entry hashes to a stable SHA-256 fingerprint over
//! `issue_key|date|time_spent|comment`. A short prefix of it (the import tag)
//! is embedded in the remote worklog comment as `[mudd-import-id:<hex>]`, so
//! a later run can recognize worklogs it already created by listing the
//! issue's worklogs. Everything here is pure; lookups live in the pipeline.

pub mod store;

pub use store::FingerprintStore;

use crate::model::WorklogEntry;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::LazyLock;

/// Default import tag length in hex characters.
pub const DEFAULT_TAG_LENGTH: usize = 8;

const TAG_PREFIX: &str = "[mudd-import-id:";

static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[mudd-import-id:([a-f0-9]+)\]").expect("import tag pattern is valid")
});

/// Full SHA-256 hex fingerprint of an entry.
#[must_use]
pub fn fingerprint(entry: &WorklogEntry) -> String {
    fingerprint_from_parts(
        entry.issue_key(),
        &entry.date_string(),
        entry.time_spent(),
        entry.comment(),
    )
}

/// Fingerprint from already-normalized fields.
#[must_use]
pub fn fingerprint_from_parts(
    issue_key: &str,
    date: &str,
    time_spent: &str,
    comment: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(issue_key.as_bytes());
    hasher.update(b"|");
    hasher.update(date.as_bytes());
    hasher.update(b"|");
    hasher.update(time_spent.as_bytes());
    hasher.update(b"|");
    hasher.update(comment.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Short import tag (first 8 hex characters of the fingerprint).
#[must_use]
pub fn import_tag(entry: &WorklogEntry) -> String {
    import_tag_with_length(entry, DEFAULT_TAG_LENGTH)
}

#[must_use]
pub fn import_tag_with_length(entry: &WorklogEntry, length: usize) -> String {
    let mut tag = fingerprint(entry);
    tag.truncate(length.min(tag.len()));
    tag
}

/// `[mudd-import-id:<tag>]`
#[must_use]
pub fn tag_marker(tag: &str) -> String {
    format!("{TAG_PREFIX}{tag}]")
}

/// Comment text with the tag marker appended.
///
/// A blank comment becomes the marker alone; otherwise the marker follows a
/// blank line.
#[must_use]
pub fn embed_tag(comment: &str, tag: &str) -> String {
    let marker = tag_marker(tag);
    if comment.trim().is_empty() {
        marker
    } else {
        format!("{comment}\n\n{marker}")
    }
}

/// All import tags found in `text`, in order of appearance.
#[must_use]
pub fn extract_tags(text: &str) -> Vec<String> {
    TAG_PATTERN
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Tags across many comments, deduplicated.
pub fn collect_tags<'a>(comments: impl IntoIterator<Item = &'a str>) -> HashSet<String> {
    comments.into_iter().flat_map(extract_tags).collect()
}
