//! Purge command implementation.

use super::{CommandContext, CommandStatus, print_json};
use crate::dedup::FingerprintStore;
use crate::error::Result;
use crate::rollback::RollbackLedger;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
struct PurgeOutput {
    ledger: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    store: Option<String>,
    fingerprints_cleared: usize,
    dry_run: bool,
}

/// Execute the purge command.
///
/// # Errors
///
/// Returns an error if configuration is invalid or either file cannot be
/// written.
pub fn execute(ctx: &CommandContext) -> Result<CommandStatus> {
    let output = &ctx.output;
    let loaded = ctx.load_config()?;
    let config = &loaded.config;

    let ledger = RollbackLedger::new(&config.rollback.path);
    let mut store = config
        .deduplication
        .store_path
        .as_ref()
        .map(FingerprintStore::load);

    let fingerprints_cleared = if output.dry_run {
        store.as_ref().map_or(0, FingerprintStore::len)
    } else {
        ledger.clear()?;
        let cleared = match store.as_mut() {
            Some(store) => {
                let cleared = store.clear();
                store.save()?;
                cleared
            }
            None => 0,
        };
        info!(ledger = %ledger.path().display(), fingerprints_cleared = cleared, "Purged local state");
        cleared
    };

    let result = PurgeOutput {
        ledger: ledger.path().display().to_string(),
        store: store.as_ref().map(|s| s.path().display().to_string()),
        fingerprints_cleared,
        dry_run: output.dry_run,
    };

    if output.json {
        print_json(&serde_json::to_value(&result)?)?;
    } else if !output.quiet {
        let verb = if output.dry_run { "Would clear" } else { "Cleared" };
        println!("{verb} rollback data ({}).", result.ledger);
        if let Some(path) = &result.store {
            println!(
                "{verb} {} local fingerprint(s) ({path}).",
                result.fingerprints_cleared
            );
        }
    }

    Ok(CommandStatus::Success)
}
