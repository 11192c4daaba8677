//! Configuration management for `jira_worklog_import`.
//!
//! Configuration sources and precedence (highest wins):
//! 1. CLI overrides (`--set key=value`)
//! 2. Environment variables (`JWI_*`, plus `JIRA_BASE_URL` and
//!    `CSV_SKIP_SSL_VERIFY`)
//! 3. YAML config file (`--config`, `CONFIG_PATH`, or `config.yml` in the
//!    working directory)
//! 4. Defaults
//!
//! Every source is flattened to dotted keys (`rate_limit.max_retries`) and
//! merged; the merged layer is then resolved into typed sections.

use crate::error::{Result, WorklogError};
use crate::mapping::DurationFormat;
use crate::rollback::DEFAULT_LEDGER_PATH;
use crate::util::time::parse_timezone;
use crate::validation::DEFAULT_ISSUE_KEY_PATTERN;
use chrono_tz::Tz;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Prefix for environment overrides (`JWI_RATE_LIMIT_MAX_RETRIES`).
pub const ENV_PREFIX: &str = "JWI_";

/// Config files picked up from the working directory when none is given.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["config.yml", "config.yaml"];

/// Default timezone for `started` timestamps.
pub const DEFAULT_TIMEZONE: &str = "Europe/Warsaw";

/// Every recognized dotted key.
pub const KNOWN_KEYS: &[&str] = &[
    "jira.base_url",
    "jira.timeout_secs",
    "csv.delimiter",
    "csv.encoding",
    "csv.skip_ssl_verify",
    "csv.source_url",
    "csv.google_sheet_url",
    "mapping.issue_key",
    "mapping.date",
    "mapping.time_spent",
    "mapping.comment",
    "time.date_format",
    "time.time_spent_format",
    "time.timezone",
    "validation.enabled",
    "validation.issue_key_pattern",
    "validation.allow_future_dates",
    "deduplication.enabled",
    "deduplication.store_path",
    "rate_limit.requests_per_second",
    "rate_limit.max_retries",
    "rate_limit.backoff_base",
    "rollback.path",
];

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigSource {
    Default,
    File,
    Env,
    Cli,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Default => "default",
            Self::File => "file",
            Self::Env => "env",
            Self::Cli => "cli",
        };
        f.write_str(label)
    }
}

/// A flat set of dotted-key configuration values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLayer {
    pub values: HashMap<String, String>,
}

impl ConfigLayer {
    /// Merge another layer on top of this one (higher precedence wins).
    pub fn merge_from(&mut self, other: &Self) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Merge multiple layers in precedence order (lowest to highest).
    #[must_use]
    pub fn merge_layers(layers: &[Self]) -> Self {
        let mut merged = Self::default();
        for layer in layers {
            merged.merge_from(layer);
        }
        merged
    }

    /// Build a layer from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_yaml(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Build a layer from YAML text.
    ///
    /// # Errors
    ///
    /// Returns a YAML error if the text is not valid YAML.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(contents)?;
        Ok(layer_from_yaml_value(&value))
    }

    /// Build a layer from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_vars(env::vars())
    }

    /// Build a layer from explicit variables (`JWI_*` and the two bare names).
    pub fn from_env_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut layer = Self::default();

        for (name, value) in vars {
            if let Some(stripped) = name.strip_prefix(ENV_PREFIX) {
                let wanted = stripped.to_lowercase();
                if let Some(key) = KNOWN_KEYS.iter().find(|key| key.replace('.', "_") == wanted) {
                    insert_key_value(&mut layer, key, value);
                } else {
                    tracing::debug!(variable = %name, "Ignoring unknown environment override");
                }
                continue;
            }
            match name.as_str() {
                "JIRA_BASE_URL" => insert_key_value(&mut layer, "jira.base_url", value),
                "CSV_SKIP_SSL_VERIFY" => {
                    insert_key_value(&mut layer, "csv.skip_ssl_verify", value);
                }
                _ => {}
            }
        }

        layer
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&normalize_key(key)).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// CLI overrides for config loading.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// `--set key=value` assignments, in order.
    pub set: Vec<(String, String)>,
}

impl CliOverrides {
    /// Parse one `key=value` assignment.
    ///
    /// # Errors
    ///
    /// Returns a config error for a missing `=` or an unknown key.
    pub fn parse_assignment(raw: &str) -> Result<(String, String)> {
        let Some((key, value)) = raw.split_once('=') else {
            return Err(WorklogError::Config(format!(
                "Expected key=value, got '{raw}'"
            )));
        };
        let key = normalize_key(key);
        if !KNOWN_KEYS.contains(&key.as_str()) {
            return Err(WorklogError::Config(format!(
                "Unknown config key '{key}'"
            )));
        }
        Ok((key, value.trim().to_string()))
    }

    #[must_use]
    pub fn as_layer(&self) -> ConfigLayer {
        let mut layer = ConfigLayer::default();
        for (key, value) in &self.set {
            insert_key_value(&mut layer, key, value.clone());
        }
        layer
    }
}

/// Tracker connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JiraConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_secs: 30,
        }
    }
}

/// Source reading settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvConfig {
    pub delimiter: String,
    pub encoding: String,
    pub skip_ssl_verify: bool,
    pub source_url: Option<String>,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            delimiter: ",".to_string(),
            encoding: "UTF-8".to_string(),
            skip_ssl_verify: false,
            source_url: None,
        }
    }
}

/// Source column names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub issue_key: String,
    pub date: String,
    pub time_spent: String,
    pub comment: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            issue_key: "Issue Key".to_string(),
            date: "Date".to_string(),
            time_spent: "Time Spent".to_string(),
            comment: "Comment".to_string(),
        }
    }
}

/// Date and duration interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeConfig {
    pub date_format: String,
    pub time_spent_format: DurationFormat,
    pub timezone: String,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            date_format: "%Y-%m-%d".to_string(),
            time_spent_format: DurationFormat::Minutes,
            timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }
}

impl TimeConfig {
    /// Resolved timezone; `None` only if the name is blank.
    ///
    /// # Errors
    ///
    /// Returns a config error for an unknown timezone name.
    pub fn tz(&self) -> Result<Option<Tz>> {
        parse_timezone(&self.timezone)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationConfig {
    pub enabled: bool,
    pub issue_key_pattern: String,
    pub allow_future_dates: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            issue_key_pattern: DEFAULT_ISSUE_KEY_PATTERN.to_string(),
            allow_future_dates: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeduplicationConfig {
    pub enabled: bool,
    /// Local fingerprint store; `None` disables it.
    pub store_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    pub requests_per_second: f64,
    pub max_retries: u32,
    pub backoff_base: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 10.0,
            max_retries: 3,
            backoff_base: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackConfig {
    pub path: PathBuf,
}

impl Default for RollbackConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_LEDGER_PATH),
        }
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub jira: JiraConfig,
    pub csv: CsvConfig,
    pub mapping: ColumnMapping,
    pub time: TimeConfig,
    pub validation: ValidationConfig,
    pub deduplication: DeduplicationConfig,
    pub rate_limit: RateLimitConfig,
    pub rollback: RollbackConfig,
}

impl Config {
    /// Resolve typed sections from a merged layer.
    ///
    /// # Errors
    ///
    /// Returns a config error for values that do not parse.
    pub fn from_layer(layer: &ConfigLayer) -> Result<Self> {
        for key in layer.values.keys() {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                tracing::warn!(key = %key, "Ignoring unknown config key");
            }
        }

        let defaults = Self::default();
        let string = |key: &str, default: &str| -> String {
            non_blank(layer, &[key]).unwrap_or(default).to_string()
        };

        let config = Self {
            jira: JiraConfig {
                base_url: string("jira.base_url", &defaults.jira.base_url),
                timeout_secs: parse_value(layer, "jira.timeout_secs")?
                    .unwrap_or(defaults.jira.timeout_secs),
            },
            csv: CsvConfig {
                delimiter: layer
                    .get("csv.delimiter")
                    .filter(|v| !v.is_empty())
                    .unwrap_or(defaults.csv.delimiter.as_str())
                    .to_string(),
                encoding: string("csv.encoding", &defaults.csv.encoding),
                skip_ssl_verify: parse_flag(layer, "csv.skip_ssl_verify")?
                    .unwrap_or(defaults.csv.skip_ssl_verify),
                source_url: non_blank(layer, &["csv.source_url", "csv.google_sheet_url"])
                    .map(str::to_string),
            },
            mapping: ColumnMapping {
                issue_key: string("mapping.issue_key", &defaults.mapping.issue_key),
                date: string("mapping.date", &defaults.mapping.date),
                time_spent: string("mapping.time_spent", &defaults.mapping.time_spent),
                comment: string("mapping.comment", &defaults.mapping.comment),
            },
            time: TimeConfig {
                date_format: string("time.date_format", &defaults.time.date_format),
                time_spent_format: non_blank(layer, &["time.time_spent_format"])
                    .map_or(defaults.time.time_spent_format, DurationFormat::parse_lenient),
                timezone: string("time.timezone", &defaults.time.timezone),
            },
            validation: ValidationConfig {
                enabled: parse_flag(layer, "validation.enabled")?
                    .unwrap_or(defaults.validation.enabled),
                issue_key_pattern: string(
                    "validation.issue_key_pattern",
                    &defaults.validation.issue_key_pattern,
                ),
                allow_future_dates: parse_flag(layer, "validation.allow_future_dates")?
                    .unwrap_or(defaults.validation.allow_future_dates),
            },
            deduplication: DeduplicationConfig {
                enabled: parse_flag(layer, "deduplication.enabled")?
                    .unwrap_or(defaults.deduplication.enabled),
                store_path: non_blank(layer, &["deduplication.store_path"]).map(PathBuf::from),
            },
            rate_limit: RateLimitConfig {
                requests_per_second: parse_value(layer, "rate_limit.requests_per_second")?
                    .unwrap_or(defaults.rate_limit.requests_per_second),
                max_retries: parse_value(layer, "rate_limit.max_retries")?
                    .unwrap_or(defaults.rate_limit.max_retries),
                backoff_base: parse_value(layer, "rate_limit.backoff_base")?
                    .unwrap_or(defaults.rate_limit.backoff_base),
            },
            rollback: RollbackConfig {
                path: non_blank(layer, &["rollback.path"])
                    .map_or(defaults.rollback.path, PathBuf::from),
            },
        };

        // Fail early rather than at the first timestamp.
        config.time.tz()?;
        Ok(config)
    }

    /// Every effective setting as `(key, value)`, in `KNOWN_KEYS` order.
    #[must_use]
    pub fn effective_values(&self) -> Vec<(&'static str, String)> {
        vec![
            ("jira.base_url", self.jira.base_url.clone()),
            ("jira.timeout_secs", self.jira.timeout_secs.to_string()),
            ("csv.delimiter", self.csv.delimiter.clone()),
            ("csv.encoding", self.csv.encoding.clone()),
            ("csv.skip_ssl_verify", self.csv.skip_ssl_verify.to_string()),
            ("csv.source_url", self.csv.source_url.clone().unwrap_or_default()),
            ("mapping.issue_key", self.mapping.issue_key.clone()),
            ("mapping.date", self.mapping.date.clone()),
            ("mapping.time_spent", self.mapping.time_spent.clone()),
            ("mapping.comment", self.mapping.comment.clone()),
            ("time.date_format", self.time.date_format.clone()),
            ("time.time_spent_format", self.time.time_spent_format.to_string()),
            ("time.timezone", self.time.timezone.clone()),
            ("validation.enabled", self.validation.enabled.to_string()),
            ("validation.issue_key_pattern", self.validation.issue_key_pattern.clone()),
            ("validation.allow_future_dates", self.validation.allow_future_dates.to_string()),
            ("deduplication.enabled", self.deduplication.enabled.to_string()),
            (
                "deduplication.store_path",
                self.deduplication
                    .store_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
            ),
            (
                "rate_limit.requests_per_second",
                self.rate_limit.requests_per_second.to_string(),
            ),
            ("rate_limit.max_retries", self.rate_limit.max_retries.to_string()),
            ("rate_limit.backoff_base", self.rate_limit.backoff_base.to_string()),
            ("rollback.path", self.rollback.path.display().to_string()),
        ]
    }
}

/// Configuration plus where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub path: Option<PathBuf>,
    layers: Vec<(ConfigSource, ConfigLayer)>,
}

impl LoadedConfig {
    /// Highest-precedence source that set `key`.
    #[must_use]
    pub fn source_of(&self, key: &str) -> ConfigSource {
        let aliases: &[&str] = if key == "csv.source_url" {
            &["csv.source_url", "csv.google_sheet_url"]
        } else {
            &[key]
        };
        self.layers
            .iter()
            .rev()
            .find(|(_, layer)| aliases.iter().any(|alias| layer.get(alias).is_some()))
            .map_or(ConfigSource::Default, |(source, _)| *source)
    }
}

/// Load `.env` from the working directory, if present.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "Failed to load .env"),
    }
}

/// Pick the config file: explicit path, then `CONFIG_PATH`, then a default
/// file in the working directory.
///
/// # Errors
///
/// Returns `ConfigNotFound` if an explicitly named file does not exist.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    let named = explicit.map(Path::to_path_buf).or_else(|| {
        env::var("CONFIG_PATH")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
    });

    if let Some(path) = named {
        if path.is_file() {
            return Ok(Some(path));
        }
        return Err(WorklogError::ConfigNotFound { path });
    }

    Ok(DEFAULT_CONFIG_FILES
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file()))
}

/// Load configuration with the standard precedence order.
///
/// # Errors
///
/// Returns an error if the config file is missing or invalid, or if any
/// value fails to parse.
pub fn load_config(explicit_path: Option<&Path>, cli: &CliOverrides) -> Result<LoadedConfig> {
    let path = resolve_config_path(explicit_path)?;
    let file_layer = match &path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "Loading config file");
            ConfigLayer::from_yaml(path)?
        }
        None => ConfigLayer::default(),
    };
    load_from_layers(path, file_layer, ConfigLayer::from_env(), cli.as_layer())
}

/// Merge explicit layers (used by `load_config` and tests).
///
/// # Errors
///
/// Returns a config error if any merged value fails to parse.
pub fn load_from_layers(
    path: Option<PathBuf>,
    file: ConfigLayer,
    env_layer: ConfigLayer,
    cli: ConfigLayer,
) -> Result<LoadedConfig> {
    let layers = vec![
        (ConfigSource::File, file),
        (ConfigSource::Env, env_layer),
        (ConfigSource::Cli, cli),
    ];
    let merged = ConfigLayer::merge_layers(
        &layers
            .iter()
            .map(|(_, layer)| layer.clone())
            .collect::<Vec<_>>(),
    );
    let config = Config::from_layer(&merged)?;
    Ok(LoadedConfig {
        config,
        path,
        layers,
    })
}

fn insert_key_value(layer: &mut ConfigLayer, key: &str, value: String) {
    layer.values.insert(normalize_key(key), value);
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase().replace('-', "_")
}

fn non_blank<'a>(layer: &'a ConfigLayer, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| layer.get(key))
        .map(str::trim)
        .find(|value| !value.is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" | "" => Some(false),
        _ => None,
    }
}

fn parse_flag(layer: &ConfigLayer, key: &str) -> Result<Option<bool>> {
    layer
        .get(key)
        .map(|value| {
            parse_bool(value).ok_or_else(|| {
                WorklogError::Config(format!("Invalid value for {key}: '{value}' (expected true/false)"))
            })
        })
        .transpose()
}

fn parse_value<T: FromStr>(layer: &ConfigLayer, key: &str) -> Result<Option<T>> {
    non_blank(layer, &[key])
        .map(|value| {
            value.parse::<T>().map_err(|_| {
                WorklogError::Config(format!("Invalid value for {key}: '{value}'"))
            })
        })
        .transpose()
}

fn layer_from_yaml_value(value: &serde_yaml::Value) -> ConfigLayer {
    let mut layer = ConfigLayer::default();
    let mut flat = HashMap::new();
    flatten_yaml(value, "", &mut flat);

    for (key, value) in flat {
        insert_key_value(&mut layer, &key, value);
    }

    layer
}

fn flatten_yaml(value: &serde_yaml::Value, prefix: &str, out: &mut HashMap<String, String>) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (key, value) in map {
                let Some(key_str) = key.as_str() else {
                    continue;
                };
                let next_prefix = if prefix.is_empty() {
                    key_str.to_string()
                } else {
                    format!("{prefix}.{key_str}")
                };
                flatten_yaml(value, &next_prefix, out);
            }
        }
        _ => {
            if let Some(value) = yaml_scalar_to_string(value) {
                out.insert(prefix.to_string(), value);
            }
        }
    }
}

fn yaml_scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Bool(v) => Some(v.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Null
        | serde_yaml::Value::Sequence(_)
        | serde_yaml::Value::Mapping(_) => None,
        serde_yaml::Value::Tagged(tagged) => yaml_scalar_to_string(&tagged.value),
    }
}
