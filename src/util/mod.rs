//! Shared utilities for `jira_worklog_import`.
//!
//! - Time parsing and `started` timestamp formatting
//! - Progress indicators (for long-running operations)
//! - Atomic file writes for persisted state

pub mod progress;
pub mod time;

use crate::error::{Result, WorklogError};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write `contents` to `path` via a sibling temp file and rename.
///
/// Readers never observe a half-written file.
///
/// # Errors
///
/// Returns an error if the temp file cannot be written or renamed.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| WorklogError::Config(format!("Invalid output path: {}", path.display())))?;
    let mut temp_name = file_name.to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(contents)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        WorklogError::with_context(format!("Failed to replace {}", path.display()), e)
    })?;
    tracing::debug!(path = %path.display(), bytes = contents.len(), "Wrote file atomically");
    Ok(())
}
