//! Issue tracker worklog gateway.
//!
//! The pipeline and the rollback executor talk to the tracker only through
//! `WorklogGateway`. `JiraClient` is the HTTP implementation; tests plug in
//! in-memory fakes.

mod client;

pub use client::{JiraClient, JiraCredentials, WORKLOG_PAGE_SIZE};

use crate::dedup;
use crate::http::Retryable;
use crate::model::{RemoteWorklog, WorklogPayload};
use std::collections::HashSet;
use thiserror::Error;

/// Failure talking to the tracker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    /// Request timed out.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Could not connect or the transport failed mid-request.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Success status but an unusable body.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The tracker refused the operation.
    #[error("Rejected: {0}")]
    Rejected(String),
}

impl TrackerError {
    /// Transient failures: timeouts, connection errors, 429 and 5xx.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Connection(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Malformed(_) | Self::Rejected(_) => false,
        }
    }

    /// HTTP status, when the tracker answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else if err.is_builder() {
            Self::Rejected(err.to_string())
        } else {
            Self::Connection(err.to_string())
        }
    }
}

impl Retryable for TrackerError {
    fn is_retryable(&self) -> bool {
        Self::is_retryable(self)
    }
}

/// Worklog operations the import and rollback paths need.
pub trait WorklogGateway {
    /// Whether the issue exists. Transport failures count as "no".
    fn issue_exists(&self, issue_key: &str) -> bool;

    /// Create a worklog and return its id.
    ///
    /// # Errors
    ///
    /// Retryable `TrackerError` for 429/5xx/transport failures, otherwise a
    /// non-retryable one.
    fn create_worklog(
        &self,
        issue_key: &str,
        payload: &WorklogPayload,
    ) -> Result<String, TrackerError>;

    /// Every worklog on the issue, across all pages.
    ///
    /// # Errors
    ///
    /// Same retryable split as `create_worklog`.
    fn get_worklogs(&self, issue_key: &str) -> Result<Vec<RemoteWorklog>, TrackerError>;

    /// Delete one worklog.
    ///
    /// # Errors
    ///
    /// Returns an error unless the tracker confirms the deletion.
    fn delete_worklog(&self, issue_key: &str, worklog_id: &str) -> Result<(), TrackerError>;

    /// Import tags already embedded in the issue's worklog comments.
    ///
    /// # Errors
    ///
    /// Propagates `get_worklogs` failures.
    fn existing_import_tags(&self, issue_key: &str) -> Result<HashSet<String>, TrackerError> {
        let worklogs = self.get_worklogs(issue_key)?;
        let comments: Vec<String> = worklogs.iter().map(RemoteWorklog::comment_text).collect();
        Ok(dedup::collect_tags(comments.iter().map(String::as_str)))
    }
}

impl<G: WorklogGateway + ?Sized> WorklogGateway for &G {
    fn issue_exists(&self, issue_key: &str) -> bool {
        (**self).issue_exists(issue_key)
    }

    fn create_worklog(
        &self,
        issue_key: &str,
        payload: &WorklogPayload,
    ) -> Result<String, TrackerError> {
        (**self).create_worklog(issue_key, payload)
    }

    fn get_worklogs(&self, issue_key: &str) -> Result<Vec<RemoteWorklog>, TrackerError> {
        (**self).get_worklogs(issue_key)
    }

    fn delete_worklog(&self, issue_key: &str, worklog_id: &str) -> Result<(), TrackerError> {
        (**self).delete_worklog(issue_key, worklog_id)
    }

    fn existing_import_tags(&self, issue_key: &str) -> Result<HashSet<String>, TrackerError> {
        (**self).existing_import_tags(issue_key)
    }
}
