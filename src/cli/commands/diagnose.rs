//! Diagnose command implementation.
//!
//! Prints where configuration and credentials come from, with secrets
//! redacted, and optionally probes one issue on the tracker.

use super::{CommandContext, CommandStatus, jira_client, print_json};
use crate::cli::DiagnoseArgs;
use crate::config::{ConfigSource, LoadedConfig};
use crate::error::Result;
use crate::tracker::WorklogGateway;
use serde::Serialize;
use std::env;
use std::path::Path;

/// Environment variables reported by `diagnose`.
const ENV_VARS: &[&str] = &["JIRA_BASE_URL", "JIRA_EMAIL", "JIRA_PASSWORD", "CONFIG_PATH"];

const REDACTED: &str = "[REDACTED]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Ok,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize)]
struct CheckResult {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(Debug, Clone, Serialize)]
struct EnvVar {
    name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct Setting {
    key: &'static str,
    value: String,
    source: String,
}

#[derive(Debug, Clone, Serialize)]
struct DiagnoseReport {
    ok: bool,
    working_dir: String,
    config_file: Option<String>,
    dotenv_present: bool,
    env: Vec<EnvVar>,
    settings: Vec<Setting>,
    checks: Vec<CheckResult>,
}

fn push_check(checks: &mut Vec<CheckResult>, name: &str, status: CheckStatus, message: String) {
    checks.push(CheckResult {
        name: name.to_string(),
        status,
        message,
    });
}

/// Mask values that carry secrets.
fn redact(name: &str, value: &str) -> String {
    let upper = name.to_ascii_uppercase();
    if upper.contains("PASSWORD") || upper.contains("TOKEN") || upper.contains("SECRET") {
        REDACTED.to_string()
    } else {
        value.to_string()
    }
}

fn env_snapshot(lookup: impl Fn(&str) -> Option<String>) -> Vec<EnvVar> {
    ENV_VARS
        .iter()
        .map(|&name| EnvVar {
            name,
            value: lookup(name).map(|value| redact(name, &value)),
        })
        .collect()
}

fn settings(loaded: &LoadedConfig) -> Vec<Setting> {
    loaded
        .config
        .effective_values()
        .into_iter()
        .map(|(key, value)| Setting {
            key,
            value: redact(key, &value),
            source: loaded.source_of(key).to_string(),
        })
        .collect()
}

/// Execute the diagnose command.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or the output
/// cannot be serialized.
pub fn execute(args: &DiagnoseArgs, ctx: &CommandContext) -> Result<CommandStatus> {
    let loaded = ctx.load_config()?;
    let mut checks = Vec::new();

    let env = env_snapshot(|name| env::var(name).ok());
    let credentials_set = env
        .iter()
        .filter(|var| var.name == "JIRA_EMAIL" || var.name == "JIRA_PASSWORD")
        .all(|var| var.value.as_deref().is_some_and(|v| !v.is_empty()));
    if credentials_set {
        push_check(&mut checks, "credentials", CheckStatus::Ok, "JIRA_EMAIL and JIRA_PASSWORD are set".to_string());
    } else {
        push_check(
            &mut checks,
            "credentials",
            CheckStatus::Warn,
            "JIRA_EMAIL or JIRA_PASSWORD is not set".to_string(),
        );
    }

    let base_url_source = loaded.source_of("jira.base_url");
    match jira_client(&loaded.config) {
        Ok(client) => {
            push_check(
                &mut checks,
                "jira.base_url",
                CheckStatus::Ok,
                format!("{} (from {base_url_source})", client.base_url()),
            );
            if let Some(issue) = args.issue.as_deref() {
                if client.issue_exists(issue) {
                    push_check(&mut checks, "issue", CheckStatus::Ok, format!("{issue} exists"));
                } else {
                    push_check(
                        &mut checks,
                        "issue",
                        CheckStatus::Error,
                        format!("{issue} not found or not accessible"),
                    );
                }
            }
        }
        Err(e) => {
            let status = if base_url_source == ConfigSource::Default {
                CheckStatus::Warn
            } else {
                CheckStatus::Error
            };
            push_check(&mut checks, "jira.base_url", status, e.to_string());
        }
    }

    let report = DiagnoseReport {
        ok: !checks.iter().any(|c| c.status == CheckStatus::Error),
        working_dir: env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
        config_file: loaded.path.as_ref().map(|p| p.display().to_string()),
        dotenv_present: Path::new(".env").is_file(),
        env,
        settings: settings(&loaded),
        checks,
    };

    if ctx.output.json {
        print_json(&serde_json::to_value(&report)?)?;
    } else {
        print_report(&report);
    }
    Ok(CommandStatus::Success)
}

fn print_report(report: &DiagnoseReport) {
    println!("--- Environment ---");
    println!("  Working directory: {}", report.working_dir);
    println!(
        "  Config file:       {}",
        report.config_file.as_deref().unwrap_or("(none, using defaults)")
    );
    println!("  .env present:      {}", report.dotenv_present);
    for var in &report.env {
        println!(
            "  {}: {}",
            var.name,
            var.value.as_deref().unwrap_or("(not set)")
        );
    }

    println!("\n--- Effective configuration ---");
    for setting in &report.settings {
        println!("  {} = {:?} [{}]", setting.key, setting.value, setting.source);
    }

    println!("\n--- Checks ---");
    for check in &report.checks {
        let label = match check.status {
            CheckStatus::Ok => "OK",
            CheckStatus::Warn => "WARN",
            CheckStatus::Error => "ERROR",
        };
        println!("  {label} {}: {}", check.name, check.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passwords_are_redacted() {
        assert_eq!(redact("JIRA_PASSWORD", "hunter2"), REDACTED);
        assert_eq!(redact("JIRA_EMAIL", "me@example.com"), "me@example.com");
    }

    #[test]
    fn env_snapshot_marks_unset_and_redacts() {
        let env = env_snapshot(|name| match name {
            "JIRA_PASSWORD" => Some("hunter2".to_string()),
            "JIRA_EMAIL" => Some("me@example.com".to_string()),
            _ => None,
        });
        let get = |name: &str| env.iter().find(|v| v.name == name).unwrap().value.clone();
        assert_eq!(get("JIRA_PASSWORD").as_deref(), Some(REDACTED));
        assert_eq!(get("JIRA_EMAIL").as_deref(), Some("me@example.com"));
        assert_eq!(get("CONFIG_PATH"), None);
    }

    #[test]
    fn settings_carry_their_source() {
        let loaded = crate::config::load_from_layers(
            None,
            crate::config::ConfigLayer::default(),
            crate::config::ConfigLayer::from_env_vars(vec![(
                "JIRA_BASE_URL".to_string(),
                "https://jira.example.com".to_string(),
            )]),
            crate::config::ConfigLayer::default(),
        )
        .unwrap();
        let settings = settings(&loaded);
        let base = settings.iter().find(|s| s.key == "jira.base_url").unwrap();
        assert_eq!(base.value, "https://jira.example.com");
        assert_eq!(base.source, "env");
        let delimiter = settings.iter().find(|s| s.key == "csv.delimiter").unwrap();
        assert_eq!(delimiter.source, "default");
    }
}
