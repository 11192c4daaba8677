//! Outbound HTTP plumbing shared by the source reader and the tracker client.
//!
//! - `RateLimiter` spaces calls to the tracker
//! - `RetryPolicy` retries transient failures with backoff
//! - `build_client` configures the blocking `reqwest` client

pub mod rate_limit;
pub mod retry;

pub use rate_limit::RateLimiter;
pub use retry::{RetryPolicy, Retryable};

use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use std::time::Duration;

/// Redirects followed before giving up.
pub const MAX_REDIRECTS: usize = 10;

/// Client settings.
#[derive(Debug, Clone, Copy)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub accept_invalid_certs: bool,
    pub follow_redirects: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            accept_invalid_certs: false,
            follow_redirects: true,
        }
    }
}

/// Build a blocking client.
///
/// # Errors
///
/// Returns the `reqwest` builder error (e.g. TLS backend failure).
pub fn build_client(options: ClientOptions) -> reqwest::Result<Client> {
    let redirect = if options.follow_redirects {
        Policy::limited(MAX_REDIRECTS)
    } else {
        Policy::none()
    };
    if options.accept_invalid_certs {
        tracing::warn!("TLS certificate verification is disabled");
    }
    Client::builder()
        .timeout(options.timeout)
        .redirect(redirect)
        .danger_accept_invalid_certs(options.accept_invalid_certs)
        .user_agent(concat!("jira_worklog_import/", env!("CARGO_PKG_VERSION")))
        .build()
}
