//! clusterscan - Distributed scan job submission
//!
//! This library submits user-defined scan jobs to an execution substrate
//! that runs them once per partition of a dataset, carrying a typed,
//! namespaced configuration across the submission boundary.
//!
//! # High-Level API
//!
//! ```ignore
//! use std::sync::Arc;
//! use clusterscan::config::Configuration;
//! use clusterscan::jobs::{builtin_registry, RecordCountJob};
//! use clusterscan::runner::ScanRunner;
//! use clusterscan::substrate::LocalSubstrate;
//! use tokio_util::sync::CancellationToken;
//!
//! let registry = builtin_registry()?;
//! let substrate = LocalSubstrate::new(Arc::clone(&registry), partitions);
//! let runner = ScanRunner::new(Arc::clone(&registry), Arc::new(substrate));
//!
//! let conf = Configuration::new(registry.schema().root()).with("scan.batchSize", 500)?;
//! let metrics = runner
//!     .run(&RecordCountJob::new(), &conf, RecordCountJob::ROOT_REFERENCE, &CancellationToken::new())
//!     .await?;
//! ```
//!
//! # Modules
//!
//! - [`config`] - Schema, configurations, transport subsetting, INI loading
//! - [`job`] - Scan job contract and name-based job resolution
//! - [`runner`] - Submission driver and completion translation
//! - [`substrate`] - Execution substrate abstraction, local substrate, dispatcher
//! - [`metrics`] - Substrate-independent counters
//! - [`jobs`] - Built-in schema and jobs

pub mod config;
pub mod job;
pub mod jobs;
pub mod logging;
pub mod metrics;
pub mod runner;
pub mod substrate;

/// Version of the clusterscan library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
