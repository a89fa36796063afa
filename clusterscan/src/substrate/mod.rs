//! Execution substrate abstraction.
//!
//! The substrate is whatever actually runs a submitted job across the
//! partitions of a dataset. The runner only needs four things from it:
//! submit a [`JobDescriptor`], wait for a terminal state, read counters
//! after success, and read a job id and state name after failure.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  submit(descriptor)   ┌─────────────────────────┐
//! │  ScanRunner  │──────────────────────►│  ExecutionSubstrate     │
//! │              │◄──────────────────────│  (LocalSubstrate, ...)  │
//! └──────┬───────┘   Box<SubmittedJob>   └───────────┬─────────────┘
//!        │                                           │ one task per partition
//!        │ wait / counters / job id                  ▼
//!        │                               ┌─────────────────────────┐
//!        └──────────────────────────────►│  ScanDispatcher         │
//!                                        │  resolve, configure,    │
//!                                        │  run ScanJob            │
//!                                        └─────────────────────────┘
//! ```

mod dispatch;
mod local;

pub use dispatch::{DispatchError, ScanDispatcher, DISPATCHER_NAME};
pub use local::{LocalJob, LocalSubstrate, LocalSubstrateConfig, TASK_COUNTER_GROUP};

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::Record;
use crate::runner::JobDescriptor;

/// Boxed future returned by substrate trait methods.
pub type SubstrateFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ============================================================================
// Counters and partitions
// ============================================================================

/// A named counter reported by the substrate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub group: String,
    pub name: String,
    pub value: i64,
}

impl Counter {
    pub fn new(group: impl Into<String>, name: impl Into<String>, value: i64) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            value,
        }
    }
}

/// One unit of input handed to a single task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub id: String,
    pub records: Vec<Record>,
}

impl Partition {
    pub fn new(id: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            id: id.into(),
            records,
        }
    }
}

// ============================================================================
// Job state
// ============================================================================

/// Lifecycle state of a submitted job.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum JobState {
    /// Accepted, tasks not yet started.
    #[default]
    Prep,
    /// Tasks are executing.
    Running,
    /// Every task completed.
    Succeeded,
    /// At least one task failed.
    Failed,
    /// Killed before completion.
    Killed,
}

impl JobState {
    /// Returns true for Succeeded, Failed and Killed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Killed)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Upper-case state name, as reported in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Prep => "PREP",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Killed => "KILLED",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors reported by substrate APIs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubstrateError {
    /// The substrate refused the job.
    #[error("submission rejected: {0}")]
    Rejected(String),

    /// A status query could not be answered.
    #[error("status unavailable for job {job_id}: {reason}")]
    StatusUnavailable { job_id: String, reason: String },

    /// The substrate stopped reporting on the job.
    #[error("lost track of job {job_id}")]
    Lost { job_id: String },
}

// ============================================================================
// Traits
// ============================================================================

/// Something that can run a submitted scan job.
pub trait ExecutionSubstrate: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Submits a job and returns a handle to it.
    ///
    /// The descriptor's environment must reach every task unchanged.
    fn submit<'a>(
        &'a self,
        descriptor: &'a JobDescriptor,
    ) -> SubstrateFuture<'a, Result<Box<dyn SubmittedJob>, SubstrateError>>;
}

/// Handle to a job accepted by an [`ExecutionSubstrate`].
///
/// Status accessors are fallible: a real substrate answers them over the
/// network and may fail independently of the job itself.
pub trait SubmittedJob: Send + Sync {
    fn job_id(&self) -> Result<String, SubstrateError>;

    fn state(&self) -> Result<JobState, SubstrateError>;

    /// Waits until the job reaches a terminal state.
    ///
    /// Resolves to `true` if the job succeeded. There is no timeout.
    fn wait_for_completion(&mut self) -> SubstrateFuture<'_, Result<bool, SubstrateError>>;

    /// Counters accumulated by the job.
    fn counters(&self) -> Result<Vec<Counter>, SubstrateError>;

    /// Extra failure detail, when the substrate has any.
    fn failure_info(&self) -> Result<Option<String>, SubstrateError> {
        Ok(None)
    }

    /// Requests that the job be killed. Best effort.
    fn kill(&self) -> SubstrateFuture<'_, Result<(), SubstrateError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!JobState::Prep.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Succeeded.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Killed.is_terminal());

        assert!(JobState::Succeeded.is_success());
        assert!(!JobState::Killed.is_success());
    }

    #[test]
    fn test_state_names() {
        assert_eq!(JobState::Failed.to_string(), "FAILED");
        assert_eq!(JobState::Killed.name(), "KILLED");
        assert_eq!(JobState::default(), JobState::Prep);
    }
}
