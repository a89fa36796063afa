//! Remote-side job dispatcher.
//!
//! Every task of a submitted job runs the [`ScanDispatcher`] against its
//! partition. The dispatcher only has the flat environment to work with:
//! it re-resolves the configuration root from the reference, rebuilds a
//! typed [`Configuration`] from the transported options, instantiates a
//! fresh job by name and drives it through the [`ScanJob`](crate::job::ScanJob)
//! lifecycle.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::Partition;
use crate::config::{ConfigError, Configuration};
use crate::job::{ResolutionError, ScanJobError, TypeRegistry};
use crate::metrics::{ScanMetrics, StandardMetric};
use crate::runner::{JOB_CLASS_KEY, JOB_CONFIG_PREFIX, JOB_CONFIG_ROOT_KEY};

/// Name of the dispatcher entry point recorded in job topologies.
pub const DISPATCHER_NAME: &str = "ScanDispatcher";

/// Errors raised while setting up or running a partition.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A reserved environment key is absent.
    #[error("environment is missing '{key}'")]
    MissingKey { key: &'static str },

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("transported configuration is invalid: {0}")]
    Config(#[from] ConfigError),

    /// Job code failed outside per-record processing.
    #[error("job failed during {stage} of partition {partition}: {source}")]
    Job {
        stage: &'static str,
        partition: String,
        #[source]
        source: ScanJobError,
    },

    /// The task was cancelled before it finished.
    #[error("partition {partition} cancelled")]
    Cancelled { partition: String },
}

/// Per-task entry point that runs a scan job over one partition.
pub struct ScanDispatcher {
    registry: Arc<TypeRegistry>,
    job_class: String,
    config: Configuration,
}

impl ScanDispatcher {
    /// Sets up a dispatcher from a task environment.
    pub fn prepare(
        environment: &BTreeMap<String, String>,
        registry: Arc<TypeRegistry>,
    ) -> Result<Self, DispatchError> {
        let job_class = required(environment, JOB_CLASS_KEY)?;
        let reference = required(environment, JOB_CONFIG_ROOT_KEY)?;

        let root = registry.resolve_root(reference)?;
        registry.check_constructible(job_class)?;

        let transported = environment.iter().filter_map(|(key, value)| {
            key.strip_prefix(JOB_CONFIG_PREFIX)
                .map(|relative| (relative, value.as_str()))
        });
        let config = Configuration::from_flat(root, transported)?;

        debug!(
            job_class = %job_class,
            reference = %reference,
            options = config.len(),
            "Prepared scan dispatcher"
        );

        Ok(Self {
            job_class: job_class.to_string(),
            registry,
            config,
        })
    }

    pub fn job_class(&self) -> &str {
        &self.job_class
    }

    /// The job's configuration, rooted at the resolved namespace.
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Runs a fresh job instance over `partition`.
    ///
    /// Each record outcome is counted under [`StandardMetric`]. Cancellation
    /// is checked between records.
    pub fn run_partition(
        &self,
        partition: &Partition,
        cancel: &CancellationToken,
    ) -> Result<ScanMetrics, DispatchError> {
        let mut job = self.registry.instantiate(&self.job_class)?;
        let mut metrics = ScanMetrics::new();

        job.worker_start(&self.config, &mut metrics)
            .map_err(|source| job_error("worker_start", partition, source))?;

        for record in &partition.records {
            if cancel.is_cancelled() {
                return Err(DispatchError::Cancelled {
                    partition: partition.id.clone(),
                });
            }
            match job.process(record, &mut metrics) {
                Ok(()) => metrics.increment_standard(StandardMetric::Success, 1),
                Err(e) => {
                    warn!(
                        partition = %partition.id,
                        key = %record.key,
                        error = %e,
                        "Record processing failed"
                    );
                    metrics.increment_standard(StandardMetric::Failure, 1);
                }
            }
        }

        job.worker_end(&mut metrics)
            .map_err(|source| job_error("worker_end", partition, source))?;

        debug!(
            partition = %partition.id,
            records = partition.records.len(),
            "Partition complete"
        );
        Ok(metrics)
    }
}

fn required<'a>(
    environment: &'a BTreeMap<String, String>,
    key: &'static str,
) -> Result<&'a str, DispatchError> {
    environment
        .get(key)
        .map(String::as_str)
        .ok_or(DispatchError::MissingKey { key })
}

fn job_error(stage: &'static str, partition: &Partition, source: ScanJobError) -> DispatchError {
    DispatchError::Job {
        stage,
        partition: partition.id.clone(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigSchema, Mutability, OptionSpec, SchemaBuilder, ValueType};
    use crate::job::{FieldValue, Record, ScanJob, SchemaProvider};

    /// Counts records, failing on any record whose value is "bad".
    #[derive(Default)]
    struct PickyJob {
        label: String,
    }

    impl ScanJob for PickyJob {
        fn name(&self) -> &str {
            Self::TYPE_NAME
        }

        fn worker_start(
            &mut self,
            config: &Configuration,
            _metrics: &mut ScanMetrics,
        ) -> Result<(), ScanJobError> {
            self.label = config.get_string("label")?;
            if self.label == "explode" {
                return Err(ScanJobError::new("refusing to start"));
            }
            Ok(())
        }

        fn process(
            &mut self,
            record: &Record,
            metrics: &mut ScanMetrics,
        ) -> Result<(), ScanJobError> {
            if record.value == "bad" {
                return Err(ScanJobError::new("bad record"));
            }
            metrics.increment(&self.label, 1);
            Ok(())
        }
    }

    impl SchemaProvider for PickyJob {
        const TYPE_NAME: &'static str = "tests::PickyJob";

        fn schema_fields(
            schema: &Arc<ConfigSchema>,
        ) -> Result<Vec<(&'static str, FieldValue)>, ConfigError> {
            Ok(vec![(
                "ROOT",
                FieldValue::Namespace(schema.root().resolve_namespace("picky")?),
            )])
        }
    }

    fn registry() -> Arc<TypeRegistry> {
        let mut builder = SchemaBuilder::new("root");
        let picky = builder.namespace(builder.root(), "picky", "").unwrap();
        builder
            .option(
                picky,
                OptionSpec::new("label", ValueType::String, Mutability::Transportable)
                    .with_default("seen"),
            )
            .unwrap();
        let mut registry = TypeRegistry::new(builder.build());
        registry.register_job::<PickyJob>().unwrap();
        Arc::new(registry)
    }

    fn environment(label: Option<&str>) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert(JOB_CLASS_KEY.to_string(), "tests::PickyJob".to_string());
        env.insert(
            JOB_CONFIG_ROOT_KEY.to_string(),
            "tests::PickyJob#ROOT".to_string(),
        );
        if let Some(label) = label {
            env.insert(format!("{}label", JOB_CONFIG_PREFIX), label.to_string());
        }
        env
    }

    fn partition() -> Partition {
        Partition::new(
            "p0",
            vec![
                Record::new("a", "ok"),
                Record::new("b", "bad"),
                Record::new("c", "ok"),
            ],
        )
    }

    #[test]
    fn test_prepare_rebuilds_configuration() {
        let dispatcher = ScanDispatcher::prepare(&environment(Some("hits")), registry()).unwrap();
        assert_eq!(dispatcher.job_class(), "tests::PickyJob");
        assert_eq!(dispatcher.config().get_string("label").unwrap(), "hits");
        assert_eq!(dispatcher.config().root().path(), "picky");
    }

    #[test]
    fn test_prepare_missing_key() {
        let mut env = environment(None);
        env.remove(JOB_CLASS_KEY);
        assert!(matches!(
            ScanDispatcher::prepare(&env, registry()),
            Err(DispatchError::MissingKey { key: JOB_CLASS_KEY })
        ));
    }

    #[test]
    fn test_prepare_unknown_job_class() {
        let mut env = environment(None);
        env.insert(JOB_CLASS_KEY.to_string(), "tests::Gone".to_string());
        assert!(matches!(
            ScanDispatcher::prepare(&env, registry()),
            Err(DispatchError::Resolution(
                ResolutionError::JobClassNotFound { .. }
            ))
        ));
    }

    #[test]
    fn test_run_partition_counts_outcomes() {
        let dispatcher = ScanDispatcher::prepare(&environment(Some("hits")), registry()).unwrap();
        let metrics = dispatcher
            .run_partition(&partition(), &CancellationToken::new())
            .unwrap();

        assert_eq!(metrics.get("hits"), 2);
        assert_eq!(metrics.get_standard(StandardMetric::Success), 2);
        assert_eq!(metrics.get_standard(StandardMetric::Failure), 1);
    }

    #[test]
    fn test_worker_start_failure_fails_partition() {
        let dispatcher =
            ScanDispatcher::prepare(&environment(Some("explode")), registry()).unwrap();
        let result = dispatcher.run_partition(&partition(), &CancellationToken::new());
        assert!(matches!(
            result,
            Err(DispatchError::Job {
                stage: "worker_start",
                ..
            })
        ));
    }

    #[test]
    fn test_cancelled_partition() {
        let dispatcher = ScanDispatcher::prepare(&environment(None), registry()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            dispatcher.run_partition(&partition(), &cancel),
            Err(DispatchError::Cancelled { .. })
        ));
    }
}
