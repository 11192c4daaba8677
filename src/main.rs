use clap::Parser;
use jira_worklog_import::cli::commands::{self, CommandContext, CommandStatus};
use jira_worklog_import::cli::{Cli, Commands, OutputContext};
use jira_worklog_import::config::{self, CliOverrides};
use jira_worklog_import::logging::init_logging;
use jira_worklog_import::{Result, StructuredError, WorklogError};
use std::io::{self, IsTerminal};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose.saturating_sub(1), cli.quiet, cli.log_file.as_deref()) {
        eprintln!("Failed to initialize logging: {e}");
    }
    config::load_dotenv();

    let ctx = match build_context(&cli) {
        Ok(ctx) => ctx,
        Err(e) => handle_error(&e, cli.json),
    };

    let result = match &cli.command {
        Commands::Import(args) => commands::import::execute(args, &ctx),
        Commands::Rollback => commands::rollback::execute(&ctx),
        Commands::Purge => commands::purge::execute(&ctx),
        Commands::Diagnose(args) => commands::diagnose::execute(args, &ctx),
    };

    match result {
        Ok(CommandStatus::Success) => {}
        Ok(CommandStatus::RollbackIncomplete(remaining)) => {
            print_structured(&StructuredError::rollback_incomplete(remaining), cli.json);
            std::process::exit(CommandStatus::RollbackIncomplete(remaining).exit_code());
        }
        Ok(CommandStatus::LedgerNotSaved { created, reason }) => {
            let error = StructuredError::ledger_not_saved(created, &reason);
            print_structured(&error, cli.json);
            std::process::exit(error.code.exit_code());
        }
        Ok(status) => std::process::exit(status.exit_code()),
        Err(e) => handle_error(&e, cli.json),
    }
}

fn build_context(cli: &Cli) -> Result<CommandContext> {
    let set = cli
        .set
        .iter()
        .map(|raw| CliOverrides::parse_assignment(raw))
        .collect::<Result<Vec<_>>>()?;

    Ok(CommandContext {
        config_path: cli.config.clone(),
        overrides: CliOverrides { set },
        output: OutputContext {
            json: cli.json,
            quiet: cli.quiet,
            verbose: cli.verbose,
            use_color: !cli.no_color && io::stdout().is_terminal(),
            dry_run: cli.dry_run,
        },
    })
}

/// Handle errors with structured output support.
///
/// When --json is set or stdout is not a TTY, outputs structured JSON to stderr.
/// Otherwise, outputs human-readable error with optional color.
fn handle_error(err: &WorklogError, json_mode: bool) -> ! {
    let structured = StructuredError::from_error(err);
    print_structured(&structured, json_mode);
    std::process::exit(structured.code.exit_code());
}

fn print_structured(structured: &StructuredError, json_mode: bool) {
    let use_json = json_mode || !io::stdout().is_terminal();

    if use_json {
        let json = structured.to_json();
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string())
        );
    } else {
        let use_color = io::stderr().is_terminal();
        eprintln!("{}", structured.to_human(use_color));
    }
}
