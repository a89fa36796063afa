//! Scan job submission driver.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::descriptor::{JobDescriptor, Topology, DEFAULT_INPUT_FORMAT};
use super::error::ScanError;
use super::translate::{translate, TerminalState};
use crate::config::{subset, Configuration, Mutability};
use crate::job::{ScanJob, TypeRegistry};
use crate::metrics::ScanMetrics;
use crate::substrate::{ExecutionSubstrate, DISPATCHER_NAME};

/// Mutabilities allowed to cross the submission boundary.
pub const TRANSPORTABLE: &[Mutability] = &[Mutability::Transportable];

/// Driver settings.
#[derive(Debug, Clone)]
pub struct ScanRunnerConfig {
    /// Input format recorded in the job topology.
    pub input_format: String,

    /// Per-partition entry point recorded in the job topology.
    pub dispatcher: String,

    /// Substrate settings copied verbatim into the job environment.
    pub settings: BTreeMap<String, String>,
}

impl Default for ScanRunnerConfig {
    fn default() -> Self {
        Self {
            input_format: DEFAULT_INPUT_FORMAT.to_string(),
            dispatcher: DISPATCHER_NAME.to_string(),
            settings: BTreeMap::new(),
        }
    }
}

impl ScanRunnerConfig {
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }
}

/// Submits scan jobs to an execution substrate and waits for their metrics.
///
/// A runner is cheap to share: it holds the registry and substrate behind
/// `Arc`s and keeps no per-submission state, so concurrent calls to
/// [`run`](Self::run) are independent jobs.
///
/// # Example
///
/// ```ignore
/// use clusterscan::runner::ScanRunner;
/// use tokio_util::sync::CancellationToken;
///
/// let runner = ScanRunner::new(registry, substrate);
/// let metrics = runner
///     .run(&job, &config, "clusterscan::jobs::RecordCountJob#SCAN_ROOT", &CancellationToken::new())
///     .await?;
/// println!("scanned {}", metrics.get("records_scanned"));
/// ```
pub struct ScanRunner {
    registry: Arc<TypeRegistry>,
    substrate: Arc<dyn ExecutionSubstrate>,
    config: ScanRunnerConfig,
}

impl ScanRunner {
    pub fn new(registry: Arc<TypeRegistry>, substrate: Arc<dyn ExecutionSubstrate>) -> Self {
        Self {
            registry,
            substrate,
            config: ScanRunnerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ScanRunnerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Builds the descriptor for a submission without submitting it.
    ///
    /// Runs every pre-submission check: root resolution, configuration
    /// subsetting and the local job-class check. The result depends only on
    /// the arguments and the runner's settings.
    pub fn prepare(
        &self,
        job: &dyn ScanJob,
        conf: &Configuration,
        conf_root_field: &str,
    ) -> Result<JobDescriptor, ScanError> {
        let root = self.registry.resolve_root(conf_root_field)?;
        let job_config = subset(&root, TRANSPORTABLE, conf)?;
        self.registry.check_constructible(job.name())?;

        let topology = Topology::map_only(&self.config.input_format, &self.config.dispatcher);
        Ok(
            JobDescriptor::new(job.name(), conf_root_field, job_config, topology)
                .with_settings(&self.config.settings),
        )
    }

    /// Runs `job` on the substrate and returns its metrics.
    ///
    /// Blocks until the job reaches a terminal state; there is no timeout.
    /// Cancelling `interrupt` stops the wait with [`ScanError::Interrupted`]
    /// and asks the substrate to kill the job.
    pub async fn run(
        &self,
        job: &dyn ScanJob,
        conf: &Configuration,
        conf_root_field: &str,
        interrupt: &CancellationToken,
    ) -> Result<ScanMetrics, ScanError> {
        let descriptor = self.prepare(job, conf, conf_root_field)?;

        if interrupt.is_cancelled() {
            return Err(ScanError::Interrupted);
        }

        info!(
            job_name = %descriptor.job_name(),
            reference = %conf_root_field,
            substrate = %self.substrate.name(),
            options = descriptor.job_config().len(),
            "Submitting scan job"
        );

        let mut submitted =
            self.substrate
                .submit(&descriptor)
                .await
                .map_err(|e| ScanError::JobExecution {
                    diagnostic: format!("Job submission failed: {}", e),
                })?;

        let outcome = tokio::select! {
            biased;
            _ = interrupt.cancelled() => None,
            result = submitted.wait_for_completion() => Some(result),
        };

        let succeeded = match outcome {
            Some(Ok(succeeded)) => succeeded,
            Some(Err(e)) => {
                warn!(error = %e, "Lost contact with job while waiting");
                false
            }
            None => {
                warn!(job_name = %descriptor.job_name(), "Interrupted, killing job");
                if let Err(e) = submitted.kill().await {
                    warn!(error = %e, "Failed to kill interrupted job");
                }
                return Err(ScanError::Interrupted);
            }
        };

        let result = translate(TerminalState::new(succeeded, submitted.as_ref()));
        match &result {
            Ok(metrics) => info!(
                job_name = %descriptor.job_name(),
                counters = metrics.custom().count(),
                "Scan job succeeded"
            ),
            Err(e) => warn!(job_name = %descriptor.job_name(), error = %e, "Scan job failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ConfigError, ConfigSchema, Configuration, OptionSpec, SchemaBuilder, ValueType,
    };
    use crate::job::{FieldValue, Record, ScanJobError, SchemaProvider};
    use crate::runner::JOB_CONFIG_PREFIX;
    use crate::substrate::LocalSubstrate;

    #[derive(Default)]
    struct EchoJob;

    impl ScanJob for EchoJob {
        fn name(&self) -> &str {
            Self::TYPE_NAME
        }

        fn process(&mut self, _: &Record, metrics: &mut ScanMetrics) -> Result<(), ScanJobError> {
            metrics.increment("records_scanned", 1);
            Ok(())
        }
    }

    impl SchemaProvider for EchoJob {
        const TYPE_NAME: &'static str = "tests::EchoJob";

        fn schema_fields(
            schema: &Arc<ConfigSchema>,
        ) -> Result<Vec<(&'static str, FieldValue)>, ConfigError> {
            Ok(vec![(
                "ROOT",
                FieldValue::Namespace(schema.root().resolve_namespace("scan")?),
            )])
        }
    }

    fn runner(partitions: usize) -> ScanRunner {
        let mut builder = SchemaBuilder::new("root");
        let scan = builder.namespace(builder.root(), "scan", "").unwrap();
        builder
            .option(
                scan,
                OptionSpec::new("batchSize", ValueType::Integer, Mutability::Transportable)
                    .with_default(100),
            )
            .unwrap();
        let mut registry = TypeRegistry::new(builder.build());
        registry.register_job::<EchoJob>().unwrap();
        let registry = Arc::new(registry);

        let partitions = (0..partitions)
            .map(|p| {
                crate::substrate::Partition::new(
                    format!("p{}", p),
                    vec![Record::new("k", "v"), Record::new("k2", "v2")],
                )
            })
            .collect();
        let substrate = LocalSubstrate::new(Arc::clone(&registry), partitions);
        ScanRunner::new(registry, Arc::new(substrate))
    }

    #[test]
    fn test_prepare_builds_descriptor() {
        let runner = runner(0)
            .with_config(ScanRunnerConfig::default().with_setting("input.partitioner", "murmur3"));
        let conf = Configuration::new(runner.registry().schema().root())
            .with("scan.batchSize", 500)
            .unwrap();

        let descriptor = runner
            .prepare(&EchoJob, &conf, "tests::EchoJob#ROOT")
            .unwrap();

        assert_eq!(descriptor.job_name(), "ScanDispatcher[tests::EchoJob]");
        assert_eq!(descriptor.job_config().get("batchSize"), Some("500"));
        assert_eq!(descriptor.topology().input_format, DEFAULT_INPUT_FORMAT);
        let env = descriptor.environment();
        assert_eq!(
            env.get(&format!("{}batchSize", JOB_CONFIG_PREFIX))
                .map(String::as_str),
            Some("500")
        );
        assert_eq!(
            env.get("input.partitioner").map(String::as_str),
            Some("murmur3")
        );
    }

    #[tokio::test]
    async fn test_run_on_local_substrate() {
        let runner = runner(3);
        let conf = Configuration::new(runner.registry().schema().root());
        let metrics = runner
            .run(
                &EchoJob,
                &conf,
                "tests::EchoJob#ROOT",
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(metrics.get("records_scanned"), 6);
    }

    #[tokio::test]
    async fn test_already_interrupted_does_not_submit() {
        let runner = runner(1);
        let conf = Configuration::new(runner.registry().schema().root());
        let interrupt = CancellationToken::new();
        interrupt.cancel();

        let result = runner
            .run(&EchoJob, &conf, "tests::EchoJob#ROOT", &interrupt)
            .await;
        assert_eq!(result, Err(ScanError::Interrupted));
    }
}
