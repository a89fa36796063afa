//! Completion and metrics translation.
//!
//! Turns a finished [`SubmittedJob`] into either [`ScanMetrics`] or a
//! [`ScanError::JobExecution`]. A failure to build the failure diagnostic
//! never replaces the failure itself: the diagnostic falls back to
//! [`GENERIC_FAILURE_DIAGNOSTIC`].

use tracing::{debug, warn};

use super::error::ScanError;
use crate::metrics::ScanMetrics;
use crate::substrate::{SubmittedJob, SubstrateError};

/// Diagnostic used when the substrate cannot describe a failed job.
pub const GENERIC_FAILURE_DIAGNOSTIC: &str = "Job failed (see substrate logs for more information)";

/// Terminal outcome of a submitted job.
pub struct TerminalState<'a> {
    pub succeeded: bool,
    pub job: &'a dyn SubmittedJob,
}

impl<'a> TerminalState<'a> {
    pub fn new(succeeded: bool, job: &'a dyn SubmittedJob) -> Self {
        Self { succeeded, job }
    }
}

/// Converts a terminal state into metrics or a job execution error.
pub fn translate(terminal: TerminalState<'_>) -> Result<ScanMetrics, ScanError> {
    if !terminal.succeeded {
        return Err(ScanError::JobExecution {
            diagnostic: failure_diagnostic(terminal.job),
        });
    }

    let counters = terminal
        .job
        .counters()
        .map_err(|e| ScanError::JobExecution {
            diagnostic: format!("Job succeeded but its counters are unavailable: {}", e),
        })?;

    let metrics = ScanMetrics::from_counters(&counters);
    debug!(
        counters = counters.len(),
        custom = metrics.custom().count(),
        "Translated job counters"
    );
    Ok(metrics)
}

/// Best-effort description of a failed job.
pub fn failure_diagnostic(job: &dyn SubmittedJob) -> String {
    match describe_failure(job) {
        Ok(diagnostic) => diagnostic,
        Err(e) => {
            warn!(error = %e, "Could not describe failed job");
            GENERIC_FAILURE_DIAGNOSTIC.to_string()
        }
    }
}

fn describe_failure(job: &dyn SubmittedJob) -> Result<String, SubstrateError> {
    let mut diagnostic = format!(
        "Job {} terminated in state {}",
        job.job_id()?,
        job.state()?
    );
    if let Some(info) = job.failure_info()? {
        diagnostic.push_str(": ");
        diagnostic.push_str(&info);
    }
    Ok(diagnostic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::CUSTOM_GROUP;
    use crate::substrate::{Counter, JobState, SubstrateFuture};

    /// Finished job with canned answers.
    struct FinishedJob {
        state: JobState,
        counters: Vec<Counter>,
        status_available: bool,
        info: Option<String>,
    }

    impl FinishedJob {
        fn failed() -> Self {
            Self {
                state: JobState::Failed,
                counters: Vec::new(),
                status_available: true,
                info: None,
            }
        }
    }

    impl SubmittedJob for FinishedJob {
        fn job_id(&self) -> Result<String, SubstrateError> {
            Ok("job_001".to_string())
        }

        fn state(&self) -> Result<JobState, SubstrateError> {
            if self.status_available {
                Ok(self.state)
            } else {
                Err(SubstrateError::StatusUnavailable {
                    job_id: "job_001".to_string(),
                    reason: "connection refused".to_string(),
                })
            }
        }

        fn wait_for_completion(&mut self) -> SubstrateFuture<'_, Result<bool, SubstrateError>> {
            let success = self.state.is_success();
            Box::pin(async move { Ok(success) })
        }

        fn counters(&self) -> Result<Vec<Counter>, SubstrateError> {
            Ok(self.counters.clone())
        }

        fn failure_info(&self) -> Result<Option<String>, SubstrateError> {
            Ok(self.info.clone())
        }

        fn kill(&self) -> SubstrateFuture<'_, Result<(), SubstrateError>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[test]
    fn test_success_yields_metrics() {
        let job = FinishedJob {
            state: JobState::Succeeded,
            counters: vec![Counter::new(CUSTOM_GROUP, "records_scanned", 42)],
            ..FinishedJob::failed()
        };
        let metrics = translate(TerminalState::new(true, &job)).unwrap();
        assert_eq!(metrics.get("records_scanned"), 42);
    }

    #[test]
    fn test_failure_diagnostic_names_job_and_state() {
        let job = FinishedJob::failed();
        match translate(TerminalState::new(false, &job)) {
            Err(ScanError::JobExecution { diagnostic }) => {
                assert!(diagnostic.contains("job_001"), "{}", diagnostic);
                assert!(diagnostic.contains("FAILED"), "{}", diagnostic);
            }
            other => panic!("Expected JobExecution, got {:?}", other),
        }
    }

    #[test]
    fn test_failure_info_is_appended() {
        let job = FinishedJob {
            info: Some("partition p3: disk on fire".to_string()),
            ..FinishedJob::failed()
        };
        assert_eq!(
            failure_diagnostic(&job),
            "Job job_001 terminated in state FAILED: partition p3: disk on fire"
        );
    }

    #[test]
    fn test_status_failure_falls_back_to_generic_diagnostic() {
        let job = FinishedJob {
            status_available: false,
            ..FinishedJob::failed()
        };
        assert_eq!(
            translate(TerminalState::new(false, &job)),
            Err(ScanError::JobExecution {
                diagnostic: GENERIC_FAILURE_DIAGNOSTIC.to_string()
            })
        );
    }

    #[test]
    fn test_killed_is_unsuccessful() {
        let job = FinishedJob {
            state: JobState::Killed,
            ..FinishedJob::failed()
        };
        let err = translate(TerminalState::new(false, &job)).unwrap_err();
        assert!(err.to_string().contains("KILLED"));
    }
}
