//! Jira REST v2 worklog client over blocking `reqwest`.

use super::{TrackerError, WorklogGateway};
use crate::error::{Result, WorklogError};
use crate::http::{ClientOptions, build_client};
use crate::model::{RemoteWorklog, WorklogPayload, deserialize_id};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Worklogs requested per page when listing.
pub const WORKLOG_PAGE_SIZE: usize = 50;

/// Basic-auth credentials (`JIRA_EMAIL` / `JIRA_PASSWORD`).
#[derive(Clone, Default)]
pub struct JiraCredentials {
    pub email: String,
    pub password: String,
}

impl JiraCredentials {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Read credentials from the environment; missing values are empty.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            email: std::env::var("JIRA_EMAIL").unwrap_or_default(),
            password: std::env::var("JIRA_PASSWORD").unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.email.is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for JiraCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JiraCredentials")
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct CreatedWorklog {
    #[serde(deserialize_with = "deserialize_id")]
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorklogPage {
    #[serde(default)]
    total: Option<usize>,
    #[serde(default)]
    worklogs: Vec<RemoteWorklog>,
}

/// HTTP implementation of `WorklogGateway`.
#[derive(Debug, Clone)]
pub struct JiraClient {
    http: Client,
    base_url: Url,
    credentials: JiraCredentials,
}

impl JiraClient {
    /// # Errors
    ///
    /// Returns a config error if `base_url` is not an absolute http(s) URL,
    /// or if the HTTP client cannot be built.
    pub fn new(base_url: &str, credentials: JiraCredentials, timeout: Duration) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(WorklogError::Config(
                "jira.base_url is not set (config or JIRA_BASE_URL)".to_string(),
            ));
        }
        let base_url = Url::parse(trimmed)
            .map_err(|e| WorklogError::Config(format!("Invalid jira.base_url '{trimmed}': {e}")))?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(WorklogError::Config(format!(
                "Invalid jira.base_url '{trimmed}': expected an http(s) URL"
            )));
        }
        if !credentials.is_complete() {
            tracing::warn!("JIRA_EMAIL or JIRA_PASSWORD is not set; requests will be unauthenticated");
        }

        let http = build_client(ClientOptions {
            timeout,
            ..ClientOptions::default()
        })
        .map_err(|e| WorklogError::with_context("Failed to build HTTP client", e))?;

        Ok(Self {
            http,
            base_url,
            credentials,
        })
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `<base>/rest/api/2/<segments...>` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> std::result::Result<Url, TrackerError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| TrackerError::Rejected(format!("Unusable base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(["rest", "api", "2"])
            .extend(segments);
        Ok(url)
    }

    /// Worklog collection URL for an issue.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` if the base URL cannot carry path segments.
    pub fn worklog_url(&self, issue_key: &str) -> std::result::Result<Url, TrackerError> {
        self.endpoint(&["issue", issue_key, "worklog"])
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        if self.credentials.email.is_empty() && self.credentials.password.is_empty() {
            request
        } else {
            request.basic_auth(&self.credentials.email, Some(&self.credentials.password))
        }
    }

    fn send(&self, request: RequestBuilder) -> std::result::Result<Response, TrackerError> {
        self.authorized(request)
            .send()
            .map_err(|e| TrackerError::from_transport(&e))
    }

    fn ensure_success(response: Response) -> std::result::Result<Response, TrackerError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(TrackerError::Status {
            status: status.as_u16(),
            body: truncate_body(&body),
        })
    }
}

fn truncate_body(body: &str) -> String {
    const LIMIT: usize = 500;
    if body.chars().count() <= LIMIT {
        body.to_string()
    } else {
        let mut truncated: String = body.chars().take(LIMIT).collect();
        truncated.push_str("...");
        truncated
    }
}

impl WorklogGateway for JiraClient {
    fn issue_exists(&self, issue_key: &str) -> bool {
        let Ok(url) = self.endpoint(&["issue", issue_key]) else {
            return false;
        };
        match self.send(self.http.get(url)) {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                tracing::debug!(issue = issue_key, error = %e, "Issue lookup failed");
                false
            }
        }
    }

    fn create_worklog(
        &self,
        issue_key: &str,
        payload: &WorklogPayload,
    ) -> std::result::Result<String, TrackerError> {
        let url = self.worklog_url(issue_key)?;
        tracing::debug!(issue = issue_key, url = %url, "Creating worklog");

        let response = Self::ensure_success(self.send(self.http.post(url).json(payload))?)?;
        let body = response
            .text()
            .map_err(|e| TrackerError::from_transport(&e))?;
        let created: CreatedWorklog = serde_json::from_str(&body)
            .map_err(|e| TrackerError::Malformed(format!("worklog response without id: {e}")))?;
        tracing::debug!(issue = issue_key, worklog_id = %created.id, "Worklog created");
        Ok(created.id)
    }

    fn get_worklogs(&self, issue_key: &str) -> std::result::Result<Vec<RemoteWorklog>, TrackerError> {
        let url = self.worklog_url(issue_key)?;
        let mut all = Vec::new();

        loop {
            let start_at = all.len().to_string();
            let page_size = WORKLOG_PAGE_SIZE.to_string();
            let request = self
                .http
                .get(url.clone())
                .query(&[("startAt", start_at.as_str()), ("maxResults", page_size.as_str())]);
            let response = Self::ensure_success(self.send(request)?)?;
            let body = response
                .text()
                .map_err(|e| TrackerError::from_transport(&e))?;
            let page: WorklogPage = serde_json::from_str(&body)
                .map_err(|e| TrackerError::Malformed(format!("worklog listing: {e}")))?;

            let received = page.worklogs.len();
            all.extend(page.worklogs);
            let total = page.total.unwrap_or(all.len());
            tracing::trace!(issue = issue_key, received, total, "Fetched worklog page");

            if received == 0 || all.len() >= total {
                break;
            }
        }

        Ok(all)
    }

    fn delete_worklog(&self, issue_key: &str, worklog_id: &str) -> std::result::Result<(), TrackerError> {
        let url = self.endpoint(&["issue", issue_key, "worklog", worklog_id])?;
        let response = self.send(self.http.delete(url))?;
        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(());
        }
        let body = response.text().unwrap_or_default();
        Err(TrackerError::Status {
            status: status.as_u16(),
            body: if body.is_empty() {
                format!("Delete worklog failed: HTTP {}", status.as_u16())
            } else {
                truncate_body(&body)
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> JiraClient {
        JiraClient::new(
            base,
            JiraCredentials::new("me@example.com", "secret"),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn base_url_trailing_slashes_are_stripped() {
        let c = client("https://jira.example.com///");
        assert_eq!(
            c.worklog_url("AB-1").unwrap().as_str(),
            "https://jira.example.com/rest/api/2/issue/AB-1/worklog"
        );
    }

    #[test]
    fn base_url_with_context_path() {
        let c = client("https://example.com/jira/");
        assert_eq!(
            c.endpoint(&["issue", "AB-1"]).unwrap().as_str(),
            "https://example.com/jira/rest/api/2/issue/AB-1"
        );
    }

    #[test]
    fn path_segments_are_encoded() {
        let c = client("https://jira.example.com");
        let url = c.endpoint(&["issue", "AB 1/x", "worklog", "10?"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://jira.example.com/rest/api/2/issue/AB%201%2Fx/worklog/10%3F"
        );
    }

    #[test]
    fn invalid_base_url_is_config_error() {
        for bad in ["", "not a url", "mailto:x@example.com", "ftp://example.com"] {
            let err = JiraClient::new(bad, JiraCredentials::default(), Duration::from_secs(1))
                .unwrap_err();
            assert!(matches!(err, WorklogError::Config(_)), "{bad}");
        }
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let debug = format!("{:?}", JiraCredentials::new("me", "hunter2"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(600);
        assert_eq!(truncate_body(&body).len(), 503);
        assert_eq!(truncate_body("short"), "short");
    }
}
