//! Rollback command implementation.
//!
//! Deletes the worklogs recorded by the last import run. With `--dry-run`
//! the ledger is only listed.

use super::{CommandContext, CommandStatus, jira_client, print_json};
use crate::dedup::FingerprintStore;
use crate::error::Result;
use crate::format::{self, RenderOptions};
use crate::http::RateLimiter;
use crate::rollback::{RollbackExecutor, RollbackLedger};
use serde_json::json;
use tracing::info;

/// Execute the rollback command.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the ledger cannot be read
/// or written. Failed deletions are reported in the summary instead.
pub fn execute(ctx: &CommandContext) -> Result<CommandStatus> {
    let output = &ctx.output;
    let loaded = ctx.load_config()?;
    let config = &loaded.config;
    let ledger = RollbackLedger::new(&config.rollback.path);

    if output.dry_run {
        return preview(&ledger, ctx);
    }

    let client = jira_client(config)?;
    let mut executor = RollbackExecutor::new(&client, ledger)
        .with_rate_limiter(RateLimiter::new(config.rate_limit.requests_per_second));
    if let Some(path) = &config.deduplication.store_path {
        executor = executor.with_store(FingerprintStore::load(path));
    }
    if output.is_verbose() && !output.json {
        executor = executor.on_rollback(|issue_key, worklog_id, elapsed| {
            println!(
                "  {issue_key} {worklog_id} rolled back in {:.2}s",
                elapsed.as_secs_f64()
            );
        });
    }

    let summary = executor.rollback_last_run()?;
    info!(
        deleted = summary.deleted,
        failed = summary.errors.len(),
        "Rollback finished"
    );

    if output.json {
        print_json(&serde_json::to_value(&summary)?)?;
    } else if !output.quiet || !summary.is_complete() {
        print!(
            "{}",
            format::render_rollback(
                &summary,
                RenderOptions {
                    use_color: output.use_color,
                    verbose: output.is_verbose(),
                }
            )
        );
    }

    if summary.is_complete() {
        Ok(CommandStatus::Success)
    } else {
        Ok(CommandStatus::RollbackIncomplete(summary.errors.len()))
    }
}

fn preview(ledger: &RollbackLedger, ctx: &CommandContext) -> Result<CommandStatus> {
    let records = ledger.load_last_run()?.unwrap_or_default();
    if ctx.output.json {
        print_json(&json!({ "dry_run": true, "would_delete": records }))?;
    } else if !ctx.output.quiet {
        println!("Would delete {} worklog(s):", records.len());
        for record in &records {
            println!("  {} {}", record.issue_key, record.worklog_id);
        }
    }
    Ok(CommandStatus::Success)
}
