//! `jira_worklog_import` - CSV / Google Sheets worklog importer for Jira
//!
//! This crate provides the core functionality for the `jwi` CLI tool.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Data types (`WorklogEntry`, payloads, rollback records)
//! - [`source`] - Tabular source reading (local CSV, URLs, Google Sheets)
//! - [`mapping`] - Row to entry mapping and duration conversion
//! - [`validation`] - Fail-fast validator chain
//! - [`dedup`] - Import fingerprints, comment tags and the local store
//! - [`http`] - Rate limiting and retry with backoff
//! - [`tracker`] - Worklog gateway trait and the Jira REST client
//! - [`pipeline`] - Import orchestration
//! - [`report`] - Import report buckets and summary
//! - [`rollback`] - Rollback ledger and executor
//! - [`config`] - Layered configuration
//! - [`error`] - Error types and handling
//! - [`format`] - Human-readable report rendering
//! - [`util`] - Time formatting and progress helpers

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod dedup;
pub mod error;
pub mod format;
pub mod http;
pub mod logging;
pub mod mapping;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod rollback;
pub mod source;
pub mod tracker;
pub mod util;
pub mod validation;

pub use error::{ErrorCode, Result, StructuredError, WorklogError};
