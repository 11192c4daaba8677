#![allow(dead_code)]

pub mod cli;
pub mod fake;

use std::sync::Once;

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        jira_worklog_import::logging::init_test_logging();
    });
}

/// Header row used by the default column mapping.
pub const HEADER: &str = "Issue Key,Date,Time Spent,Comment";

/// CSV text from a header and data lines.
pub fn csv(lines: &[&str]) -> String {
    let mut text = String::from(HEADER);
    for line in lines {
        text.push('\n');
        text.push_str(line);
    }
    text.push('\n');
    text
}
