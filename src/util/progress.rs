//! Progress indicator utilities for long-running operations.
//!
//! Provides:
//! - A determinate bar for worklog submission (known entry count)
//! - A spinner while the source is fetched or tags are looked up
//! - Conditional display based on terminal detection

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{IsTerminal, stderr};
use std::time::Duration;

/// Check if we should show progress indicators.
///
/// Progress is shown only if stderr is an interactive terminal and the
/// caller is not in JSON, quiet or verbose mode (verbose mode prints
/// per-entry lines instead).
#[must_use]
pub fn should_show_progress(json: bool, quiet: bool, verbose: bool) -> bool {
    !json && !quiet && !verbose && stderr().is_terminal()
}

/// Create a determinate progress bar for operations with known total count.
#[must_use]
pub fn create_progress_bar(total: u64, message: &str, show: bool) -> ProgressBar {
    let pb = ProgressBar::new(total);

    if show {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map_or_else(|_| ProgressStyle::default_bar(), |style| style.progress_chars("=>-"));
        pb.set_style(style);
        pb.set_message(message.to_string());
    } else {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }

    pb
}

/// Create a spinner for indeterminate operations.
#[must_use]
pub fn create_spinner(message: &str, show: bool) -> ProgressBar {
    let pb = ProgressBar::new_spinner();

    if show {
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(60));
    } else {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }

    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_bar_hidden() {
        let pb = create_progress_bar(100, "Importing", false);
        pb.inc(50);
        pb.finish();
    }

    #[test]
    fn test_spinner_hidden() {
        let spinner = create_spinner("Reading CSV...", false);
        spinner.finish_and_clear();
    }

    #[test]
    fn test_json_mode_never_shows_progress() {
        assert!(!should_show_progress(true, false, false));
        assert!(!should_show_progress(false, true, false));
        assert!(!should_show_progress(false, false, true));
    }
}
