//! Tabular source reader.
//!
//! Reads CSV from a local file or an http(s) URL (shared spreadsheet links
//! are rewritten to their CSV export) and returns one `SourceRow` per record.

mod csv;

pub use self::csv::parse_csv;

use crate::config::CsvConfig;
use crate::error::{Result, WorklogError};
use crate::http::{ClientOptions, MAX_REDIRECTS, build_client};
use crate::model::SourceRow;
use regex::Regex;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

static SHEETS_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:https?://)?(?:www\.)?docs\.google\.com/spreadsheets/d/([a-zA-Z0-9_-]+)")
        .expect("sheets id pattern is valid")
});

const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Text encoding of the source bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceEncoding {
    #[default]
    Utf8,
    Latin1,
}

impl FromStr for SourceEncoding {
    type Err = WorklogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "" | "utf-8" | "utf8" | "bom|utf-8" => Ok(Self::Utf8),
            "iso-8859-1" | "latin1" | "latin-1" => Ok(Self::Latin1),
            other => Err(WorklogError::Config(format!(
                "Unsupported csv.encoding: {other} (use UTF-8 or ISO-8859-1)"
            ))),
        }
    }
}

impl fmt::Display for SourceEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Utf8 => f.write_str("UTF-8"),
            Self::Latin1 => f.write_str("ISO-8859-1"),
        }
    }
}

impl SourceEncoding {
    /// Decode raw bytes. UTF-8 is decoded lossily and loses a leading BOM.
    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Self::Utf8 => {
                let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
                String::from_utf8_lossy(bytes).into_owned()
            }
            Self::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
        }
    }
}

/// Rewrite a shared spreadsheet link to its CSV export URL.
///
/// Other locators are returned trimmed and otherwise unchanged.
#[must_use]
pub fn normalize_locator(locator: &str) -> String {
    let locator = locator.trim();
    SHEETS_ID
        .captures(locator)
        .and_then(|caps| caps.get(1))
        .map_or_else(
            || locator.to_string(),
            |id| {
                format!(
                    "https://docs.google.com/spreadsheets/d/{}/export?format=csv",
                    id.as_str()
                )
            },
        )
}

/// Reads rows from a file or URL.
#[derive(Debug, Clone)]
pub struct SourceReader {
    delimiter: u8,
    encoding: SourceEncoding,
    skip_ssl_verify: bool,
}

impl SourceReader {
    /// # Errors
    ///
    /// Returns a config error for an unusable delimiter or encoding.
    pub fn new(config: &CsvConfig) -> Result<Self> {
        Ok(Self {
            delimiter: parse_delimiter(&config.delimiter)?,
            encoding: config.encoding.parse()?,
            skip_ssl_verify: config.skip_ssl_verify,
        })
    }

    #[must_use]
    pub const fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// Read and parse the source.
    ///
    /// # Errors
    ///
    /// Returns `SourceNotFound`, `SourceFetch`, `TooManyRedirects` or
    /// `CsvParse` depending on where reading fails.
    pub fn read(&self, locator: &str) -> Result<Vec<SourceRow>> {
        let content = self.fetch_content(locator)?;
        let rows = parse_csv(&content, self.delimiter)?;
        tracing::info!(rows = rows.len(), "Read source rows");
        Ok(rows)
    }

    fn fetch_content(&self, locator: &str) -> Result<String> {
        let locator = normalize_locator(locator);
        if locator.is_empty() {
            return Err(WorklogError::Config("No CSV source given".to_string()));
        }

        match Url::parse(&locator) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => self.fetch_url(url),
            _ => self.read_file(&locator),
        }
    }

    fn fetch_url(&self, url: Url) -> Result<String> {
        tracing::debug!(url = %url, "Fetching source");
        let display = url.to_string();
        let client = build_client(ClientOptions {
            timeout: FETCH_TIMEOUT,
            accept_invalid_certs: self.skip_ssl_verify,
            follow_redirects: true,
        })
        .map_err(|e| WorklogError::with_context("Failed to build HTTP client", e))?;

        let response = client.get(url).send().map_err(|e| {
            if e.is_redirect() {
                WorklogError::TooManyRedirects {
                    url: display.clone(),
                    limit: MAX_REDIRECTS,
                }
            } else {
                WorklogError::SourceFetch {
                    url: display.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(WorklogError::SourceFetch {
                url: display,
                reason: format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                ),
            });
        }

        let bytes = response.bytes().map_err(|e| WorklogError::SourceFetch {
            url: display,
            reason: e.to_string(),
        })?;
        Ok(self.encoding.decode(&bytes))
    }

    fn read_file(&self, path: &str) -> Result<String> {
        let path = PathBuf::from(path);
        match std::fs::read(&path) {
            Ok(bytes) => {
                tracing::debug!(path = %path.display(), bytes = bytes.len(), "Read source file");
                Ok(self.encoding.decode(&bytes))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(WorklogError::SourceNotFound { path })
            }
            Err(e) => Err(WorklogError::with_context(
                format!("Failed to read {}", path.display()),
                e,
            )),
        }
    }
}

fn parse_delimiter(value: &str) -> Result<u8> {
    if value == "\\t" || value == "tab" {
        return Ok(b'\t');
    }
    match value.as_bytes() {
        [b] if b.is_ascii() && !matches!(b, b'"' | b'\n' | b'\r') => Ok(*b),
        _ => Err(WorklogError::Config(format!(
            "csv.delimiter must be a single ASCII character, got {value:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn sheets_links_are_rewritten() {
        let cases = [
            "https://docs.google.com/spreadsheets/d/abc_DEF-123/edit#gid=0",
            "docs.google.com/spreadsheets/d/abc_DEF-123",
            "  HTTPS://www.docs.google.com/spreadsheets/d/abc_DEF-123/view  ",
        ];
        for case in cases {
            assert_eq!(
                normalize_locator(case),
                "https://docs.google.com/spreadsheets/d/abc_DEF-123/export?format=csv",
                "{case}"
            );
        }
        assert_eq!(normalize_locator(" data.csv "), "data.csv");
        assert_eq!(
            normalize_locator("https://example.com/a.csv"),
            "https://example.com/a.csv"
        );
    }

    #[test]
    fn encodings() {
        assert_eq!(SourceEncoding::Utf8.decode(b"\xEF\xBB\xBFa,b"), "a,b");
        assert_eq!(SourceEncoding::Latin1.decode(b"caf\xE9"), "café");
        assert_eq!("latin1".parse::<SourceEncoding>().unwrap(), SourceEncoding::Latin1);
        assert_eq!("ISO-8859-1".parse::<SourceEncoding>().unwrap(), SourceEncoding::Latin1);
        assert_eq!("utf-8".parse::<SourceEncoding>().unwrap(), SourceEncoding::Utf8);
        assert!("EBCDIC".parse::<SourceEncoding>().is_err());
    }

    #[test]
    fn delimiters() {
        assert_eq!(parse_delimiter(";").unwrap(), b';');
        assert_eq!(parse_delimiter("\\t").unwrap(), b'\t');
        assert!(parse_delimiter("§").is_err());
        assert!(parse_delimiter(";;").is_err());
        assert!(parse_delimiter("").is_err());
    }

    #[test]
    fn reads_local_file_with_custom_delimiter() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("log.csv");
        fs::write(&path, "Issue Key;Date;Time Spent;Comment\nAB-1;2025-01-10;60;a;b\n").unwrap();

        let config = CsvConfig {
            delimiter: ";".to_string(),
            ..CsvConfig::default()
        };
        let rows = SourceReader::new(&config)
            .unwrap()
            .read(path.to_str().unwrap())
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("Comment"), Some("a"));
        assert_eq!(rows[0].line, 2);
    }

    #[test]
    fn missing_file_is_source_not_found() {
        let reader = SourceReader::new(&CsvConfig::default()).unwrap();
        let err = reader.read("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, WorklogError::SourceNotFound { .. }));
    }

    #[test]
    fn empty_locator_is_config_error() {
        let reader = SourceReader::new(&CsvConfig::default()).unwrap();
        assert!(matches!(reader.read("  "), Err(WorklogError::Config(_))));
    }
}
