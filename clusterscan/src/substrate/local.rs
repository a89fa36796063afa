//! In-process execution substrate.
//!
//! [`LocalSubstrate`] runs a submitted job inside the current process on
//! the tokio runtime. Each partition becomes one task: tasks wait for a
//! semaphore permit, then run the [`ScanDispatcher`] on the blocking pool.
//! Job state is published on a watch channel, the same way the rest of the
//! crate reports long-running work.
//!
//! # State transitions
//!
//! ```text
//! PREP ──► RUNNING ──┬──► SUCCEEDED   every partition completed
//!                    ├──► FAILED      a partition failed (others are cancelled)
//!                    └──► KILLED      kill() was called
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::dispatch::{DispatchError, ScanDispatcher, DISPATCHER_NAME};
use super::{
    Counter, ExecutionSubstrate, JobState, Partition, SubmittedJob, SubstrateError,
    SubstrateFuture,
};
use crate::job::TypeRegistry;
use crate::metrics::ScanMetrics;
use crate::runner::JobDescriptor;

/// Counter group for the substrate's own bookkeeping.
pub const TASK_COUNTER_GROUP: &str = "substrate.tasks";

/// Global counter for local job ids.
static LOCAL_JOB_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Configuration for [`LocalSubstrate`].
#[derive(Debug, Clone)]
pub struct LocalSubstrateConfig {
    /// Maximum number of partitions processed at once.
    pub max_concurrent_tasks: usize,

    /// How often a waiting caller logs that the job is still running.
    pub poll_interval: Duration,

    /// Log state changes and still-running notices at `info` instead of
    /// `debug`.
    pub report_progress: bool,
}

impl Default for LocalSubstrateConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            poll_interval: Duration::from_secs(5),
            report_progress: false,
        }
    }
}

/// Runs scan jobs over in-memory partitions.
pub struct LocalSubstrate {
    registry: Arc<TypeRegistry>,
    partitions: Arc<Vec<Partition>>,
    config: LocalSubstrateConfig,
}

impl LocalSubstrate {
    /// Creates a substrate that scans `partitions`, resolving jobs through
    /// `registry`.
    pub fn new(registry: Arc<TypeRegistry>, partitions: Vec<Partition>) -> Self {
        Self {
            registry,
            partitions: Arc::new(partitions),
            config: LocalSubstrateConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LocalSubstrateConfig) -> Self {
        self.config = config;
        self
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    fn validate(descriptor: &JobDescriptor) -> Result<(), SubstrateError> {
        let topology = descriptor.topology();
        if topology.mapper != DISPATCHER_NAME {
            return Err(SubstrateError::Rejected(format!(
                "unknown mapper '{}'",
                topology.mapper
            )));
        }
        if !topology.is_map_only() {
            return Err(SubstrateError::Rejected(format!(
                "expected a map-only job, got {} reduce tasks",
                topology.reduce_tasks
            )));
        }
        Ok(())
    }
}

impl ExecutionSubstrate for LocalSubstrate {
    fn name(&self) -> &str {
        "local"
    }

    fn submit<'a>(
        &'a self,
        descriptor: &'a JobDescriptor,
    ) -> SubstrateFuture<'a, Result<Box<dyn SubmittedJob>, SubstrateError>> {
        Box::pin(async move {
            Self::validate(descriptor)?;

            let job_id = format!(
                "job_local_{:04}",
                LOCAL_JOB_COUNTER.fetch_add(1, Ordering::Relaxed)
            );
            let (status_tx, status_rx) = watch::channel(LocalStatus::default());
            let kill = CancellationToken::new();

            info!(
                job_id = %job_id,
                job_name = %descriptor.job_name(),
                partitions = self.partitions.len(),
                "Local job submitted"
            );

            let driver = JobDriver {
                job_id: job_id.clone(),
                environment: Arc::new(descriptor.environment()),
                registry: Arc::clone(&self.registry),
                partitions: Arc::clone(&self.partitions),
                semaphore: Arc::new(Semaphore::new(self.config.max_concurrent_tasks.max(1))),
                kill: kill.clone(),
                status_tx,
            };
            tokio::spawn(driver.run());

            Ok(Box::new(LocalJob {
                job_id,
                status_rx,
                kill,
                poll_interval: self.config.poll_interval,
                report_progress: self.config.report_progress,
            }) as Box<dyn SubmittedJob>)
        })
    }
}

// ============================================================================
// Job status
// ============================================================================

#[derive(Debug, Clone, Default)]
struct LocalStatus {
    state: JobState,
    counters: Vec<Counter>,
    failure: Option<String>,
}

/// Handle to a job running on a [`LocalSubstrate`].
pub struct LocalJob {
    job_id: String,
    status_rx: watch::Receiver<LocalStatus>,
    kill: CancellationToken,
    poll_interval: Duration,
    report_progress: bool,
}

impl LocalJob {
    fn report(&self, state: JobState, message: &str) {
        if self.report_progress {
            info!(job_id = %self.job_id, state = %state, "{}", message);
        } else {
            debug!(job_id = %self.job_id, state = %state, "{}", message);
        }
    }
}

impl SubmittedJob for LocalJob {
    fn job_id(&self) -> Result<String, SubstrateError> {
        Ok(self.job_id.clone())
    }

    fn state(&self) -> Result<JobState, SubstrateError> {
        Ok(self.status_rx.borrow().state)
    }

    fn wait_for_completion(&mut self) -> SubstrateFuture<'_, Result<bool, SubstrateError>> {
        Box::pin(async move {
            let mut last = self.status_rx.borrow().state;
            loop {
                if last.is_terminal() {
                    return Ok(last.is_success());
                }
                match tokio::time::timeout(self.poll_interval, self.status_rx.changed()).await {
                    Ok(Ok(())) => {
                        let state = self.status_rx.borrow_and_update().state;
                        if state != last {
                            self.report(state, "Job state changed");
                            last = state;
                        }
                    }
                    Ok(Err(_)) => {
                        // Sender dropped: the final state is already published
                        let state = self.status_rx.borrow().state;
                        if state.is_terminal() {
                            return Ok(state.is_success());
                        }
                        return Err(SubstrateError::Lost {
                            job_id: self.job_id.clone(),
                        });
                    }
                    Err(_) => self.report(last, "Job still running"),
                }
            }
        })
    }

    fn counters(&self) -> Result<Vec<Counter>, SubstrateError> {
        let status = self.status_rx.borrow();
        if !status.state.is_terminal() {
            return Err(SubstrateError::StatusUnavailable {
                job_id: self.job_id.clone(),
                reason: format!("job is still {}", status.state),
            });
        }
        Ok(status.counters.clone())
    }

    fn failure_info(&self) -> Result<Option<String>, SubstrateError> {
        Ok(self.status_rx.borrow().failure.clone())
    }

    fn kill(&self) -> SubstrateFuture<'_, Result<(), SubstrateError>> {
        Box::pin(async move {
            info!(job_id = %self.job_id, "Killing local job");
            self.kill.cancel();
            Ok(())
        })
    }
}

// ============================================================================
// Driver
// ============================================================================

struct JobDriver {
    job_id: String,
    environment: Arc<BTreeMap<String, String>>,
    registry: Arc<TypeRegistry>,
    partitions: Arc<Vec<Partition>>,
    semaphore: Arc<Semaphore>,
    kill: CancellationToken,
    status_tx: watch::Sender<LocalStatus>,
}

impl JobDriver {
    async fn run(self) {
        self.status_tx.send_modify(|s| s.state = JobState::Running);

        // Cancelled on kill, or when any partition fails
        let abort = self.kill.child_token();
        let mut tasks = JoinSet::new();

        for index in 0..self.partitions.len() {
            let environment = Arc::clone(&self.environment);
            let registry = Arc::clone(&self.registry);
            let partitions = Arc::clone(&self.partitions);
            let semaphore = Arc::clone(&self.semaphore);
            let abort = abort.clone();

            tasks.spawn(async move {
                let id = partitions[index].id.clone();
                let permit = tokio::select! {
                    permit = semaphore.acquire_owned() => permit.ok(),
                    _ = abort.cancelled() => None,
                };
                let Some(_permit) = permit else {
                    return Err(TaskFailure::Cancelled(id));
                };

                let task = tokio::task::spawn_blocking(move || {
                    let dispatcher = ScanDispatcher::prepare(&environment, registry)?;
                    dispatcher.run_partition(&partitions[index], &abort)
                });
                match task.await {
                    Ok(Ok(metrics)) => Ok(metrics),
                    Ok(Err(DispatchError::Cancelled { partition })) => {
                        Err(TaskFailure::Cancelled(partition))
                    }
                    Ok(Err(e)) => Err(TaskFailure::Failed(id, e.to_string())),
                    Err(e) => Err(TaskFailure::Failed(id, format!("task panicked: {}", e))),
                }
            });
        }

        let mut metrics = ScanMetrics::new();
        let mut completed = 0i64;
        let mut failure: Option<String> = None;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(partition_metrics)) => {
                    metrics.merge(&partition_metrics);
                    completed += 1;
                }
                Ok(Err(TaskFailure::Cancelled(id))) => {
                    debug!(job_id = %self.job_id, partition = %id, "Partition cancelled");
                }
                Ok(Err(TaskFailure::Failed(id, reason))) => {
                    warn!(
                        job_id = %self.job_id,
                        partition = %id,
                        reason = %reason,
                        "Partition failed"
                    );
                    failure.get_or_insert_with(|| format!("partition {}: {}", id, reason));
                    abort.cancel();
                }
                Err(e) => {
                    warn!(job_id = %self.job_id, error = %e, "Partition task aborted");
                    failure.get_or_insert_with(|| e.to_string());
                    abort.cancel();
                }
            }
        }

        let state = if self.kill.is_cancelled() {
            JobState::Killed
        } else if failure.is_some() {
            JobState::Failed
        } else {
            JobState::Succeeded
        };

        let mut counters = metrics.to_counters();
        counters.push(Counter::new(TASK_COUNTER_GROUP, "COMPLETED", completed));
        counters.push(Counter::new(
            TASK_COUNTER_GROUP,
            "LAUNCHED",
            self.partitions.len() as i64,
        ));

        info!(job_id = %self.job_id, state = %state, completed, "Local job finished");

        self.status_tx.send_modify(|s| {
            s.state = state;
            s.counters = counters;
            s.failure = failure;
        });
    }
}

enum TaskFailure {
    Cancelled(String),
    Failed(String, String),
}
