//! The scan job contract.
//!
//! A scan job is user code executed once per partition of the scanned
//! dataset. The submitting process never runs it directly: it only records
//! the job's name, and each remote task instantiates a fresh job from the
//! [`TypeRegistry`](super::TypeRegistry) and drives it through the
//! lifecycle below.
//!
//! # Lifecycle
//!
//! 1. [`worker_start`](ScanJob::worker_start) once per partition, with the
//!    job's typed configuration rebuilt from the transported form.
//! 2. [`process`](ScanJob::process) once per record of the partition.
//! 3. [`worker_end`](ScanJob::worker_end) once after the last record.

use thiserror::Error;

use crate::config::Configuration;
use crate::metrics::ScanMetrics;

/// A single key/value record from the scanned dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: String,
    pub value: String,
}

impl Record {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Error raised by scan job code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ScanJobError {
    message: String,
}

impl ScanJobError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<crate::config::ConfigError> for ScanJobError {
    fn from(e: crate::config::ConfigError) -> Self {
        Self::new(e.to_string())
    }
}

/// User-defined computation run against every partition of a dataset.
///
/// Errors from [`worker_start`](Self::worker_start) and
/// [`worker_end`](Self::worker_end) fail the whole partition. An error from
/// [`process`](Self::process) only fails that record: the dispatcher counts
/// it under [`StandardMetric::Failure`](crate::metrics::StandardMetric) and
/// moves on to the next record.
pub trait ScanJob: Send + Sync {
    /// Registered name of the job implementation.
    fn name(&self) -> &str;

    /// Prepares the job for one partition.
    fn worker_start(
        &mut self,
        _config: &Configuration,
        _metrics: &mut ScanMetrics,
    ) -> Result<(), ScanJobError> {
        Ok(())
    }

    /// Processes one record.
    fn process(&mut self, record: &Record, metrics: &mut ScanMetrics) -> Result<(), ScanJobError>;

    /// Finishes one partition.
    fn worker_end(&mut self, _metrics: &mut ScanMetrics) -> Result<(), ScanJobError> {
        Ok(())
    }
}
