//! Import command implementation.

use super::{CommandContext, CommandStatus, jira_client, print_json};
use crate::cli::ImportArgs;
use crate::error::{Result, WorklogError};
use crate::format::{self, RenderOptions};
use crate::http::{RateLimiter, RetryPolicy};
use crate::pipeline::{ImportPipeline, PipelineOptions};
use crate::util::progress::{create_progress_bar, should_show_progress};
use crate::util::time::parse_import_date;
use tracing::{debug, info};

/// Execute the import command.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the source is missing or
/// unreadable, or the rollback ledger cannot be written. Per-entry failures
/// are reported, not returned.
pub fn execute(args: &ImportArgs, ctx: &CommandContext) -> Result<CommandStatus> {
    let output = &ctx.output;
    let loaded = ctx.load_config()?;
    let config = &loaded.config;

    let source = args
        .source
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| config.csv.source_url.clone())
        .ok_or_else(|| {
            WorklogError::Config(
                "No CSV source. Provide a file path or URL, or set csv.source_url in config.yml."
                    .to_string(),
            )
        })?;

    let options = PipelineOptions {
        dry_run: output.dry_run,
        start_date: parse_import_date(args.start_date.as_deref(), "start-date")?,
        end_date: parse_import_date(args.end_date.as_deref(), "end-date")?,
        ..PipelineOptions::default()
    };
    options.check_date_range()?;

    let client = jira_client(config)?;
    let mut pipeline = ImportPipeline::from_config(&client, config, options)?;

    if output.dry_run {
        pipeline = pipeline
            .with_rate_limiter(RateLimiter::unlimited())
            .with_retry(RetryPolicy::none());
    }

    let show_progress =
        !output.dry_run && should_show_progress(output.json, output.quiet, output.is_verbose());
    let progress = create_progress_bar(0, "Importing worklogs", show_progress);
    pipeline = pipeline.with_progress(progress.clone());

    if output.is_verbose() && !output.dry_run && !output.json {
        pipeline = pipeline.on_import(|entry, _worklog_id, elapsed| {
            println!(
                "  {} imported in {:.2}s",
                entry.issue_key(),
                elapsed.as_secs_f64()
            );
        });
    }

    info!(source = %source, dry_run = output.dry_run, "Starting import");
    if output.is_verbose() && !output.json {
        println!("Reading CSV from {source}...");
    }

    let outcomes = pipeline.run(&source);
    progress.finish_and_clear();
    let outcomes = outcomes?;
    let report = pipeline.report();

    if output.json {
        print_json(&format::import_json(report, &outcomes))?;
    } else if !output.quiet {
        let render = RenderOptions {
            use_color: output.use_color,
            verbose: output.is_verbose(),
        };
        print!(
            "{}",
            format::render_import(report, &outcomes, render, |key| {
                client.worklog_url(key).ok().map(|url| url.to_string())
            })
        );
    }

    if let Some(path) = &args.report_json {
        report.write_json(path)?;
        if output.is_verbose() && !output.json {
            println!("Report written to {}", path.display());
        }
    }

    debug!(summary = ?report.summary(), "Import command finished");
    if let Some(reason) = report.ledger_error() {
        return Ok(CommandStatus::LedgerNotSaved {
            created: report.created_count(),
            reason: reason.to_string(),
        });
    }
    if report.has_failures() {
        Ok(CommandStatus::EntriesFailed)
    } else {
        Ok(CommandStatus::Success)
    }
}
