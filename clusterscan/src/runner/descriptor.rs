//! Job descriptors and the submitted environment.
//!
//! A [`JobDescriptor`] is everything the substrate receives for one
//! submission. Its [`environment`](JobDescriptor::environment) is the flat
//! string map each remote task sees:
//!
//! | Key | Value |
//! |-----|-------|
//! | `scan.job.class` | registered job name |
//! | `scan.job.config-root` | `<type>#<field>` root reference |
//! | `scan.job.config.<path>` | transported job options, wire-encoded |
//! | anything else | extra substrate settings, copied verbatim |

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::TransportableConfiguration;

/// Environment key holding the job implementation name.
pub const JOB_CLASS_KEY: &str = "scan.job.class";

/// Environment key holding the configuration-root reference.
pub const JOB_CONFIG_ROOT_KEY: &str = "scan.job.config-root";

/// Prefix under which transported job options are stored.
pub const JOB_CONFIG_PREFIX: &str = "scan.job.config.";

/// Prefix shared by every reserved environment key.
pub const RESERVED_PREFIX: &str = "scan.job.";

/// Input format used when none is configured.
pub const DEFAULT_INPUT_FORMAT: &str = "partitioned-store";

/// Where task output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputSink {
    /// Output is thrown away; only side effects and counters matter.
    Discard,
}

/// Execution topology of a scan job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Topology {
    pub input_format: String,
    pub output: OutputSink,
    /// Name of the per-partition entry point.
    pub mapper: String,
    pub reduce_tasks: u32,
}

impl Topology {
    /// A single map phase with no reducers and discarded output.
    pub fn map_only(input_format: impl Into<String>, mapper: impl Into<String>) -> Self {
        Self {
            input_format: input_format.into(),
            output: OutputSink::Discard,
            mapper: mapper.into(),
            reduce_tasks: 0,
        }
    }

    pub fn is_map_only(&self) -> bool {
        self.reduce_tasks == 0 && self.output == OutputSink::Discard
    }
}

/// Everything submitted to the substrate for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobDescriptor {
    job_name: String,
    job_class: String,
    config_root: String,
    job_config: TransportableConfiguration,
    settings: BTreeMap<String, String>,
    topology: Topology,
}

impl JobDescriptor {
    pub fn new(
        job_class: impl Into<String>,
        config_root: impl Into<String>,
        job_config: TransportableConfiguration,
        topology: Topology,
    ) -> Self {
        let job_class = job_class.into();
        Self {
            job_name: format!("{}[{}]", topology.mapper, job_class),
            job_class,
            config_root: config_root.into(),
            job_config,
            settings: BTreeMap::new(),
            topology,
        }
    }

    /// Adds substrate settings copied verbatim into the environment.
    ///
    /// Settings under the reserved `scan.job.` prefix are ignored.
    pub fn with_settings(mut self, settings: &BTreeMap<String, String>) -> Self {
        self.settings.extend(
            settings
                .iter()
                .filter(|(key, _)| !key.starts_with(RESERVED_PREFIX))
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        self
    }

    /// Display name, `<mapper>[<job class>]`.
    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn job_class(&self) -> &str {
        &self.job_class
    }

    pub fn config_root(&self) -> &str {
        &self.config_root
    }

    pub fn job_config(&self) -> &TransportableConfiguration {
        &self.job_config
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// The flat string map handed to every task.
    pub fn environment(&self) -> BTreeMap<String, String> {
        let mut env = self.settings.clone();
        for (key, value) in self.job_config.iter() {
            env.insert(format!("{}{}", JOB_CONFIG_PREFIX, key), value.to_string());
        }
        env.insert(JOB_CLASS_KEY.to_string(), self.job_class.clone());
        env.insert(JOB_CONFIG_ROOT_KEY.to_string(), self.config_root.clone());
        env
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{subset, Configuration, Mutability, OptionSpec, SchemaBuilder, ValueType};

    fn carrier() -> TransportableConfiguration {
        let mut builder = SchemaBuilder::new("root");
        let scan = builder.namespace(builder.root(), "scan", "").unwrap();
        builder
            .option(
                scan,
                OptionSpec::new("batchSize", ValueType::Integer, Mutability::Transportable),
            )
            .unwrap();
        let schema = builder.build();
        let config = Configuration::new(schema.root())
            .with("scan.batchSize", 500)
            .unwrap();
        let scan = schema.root().resolve_namespace("scan").unwrap();
        subset(&scan, &[Mutability::Transportable], &config).unwrap()
    }

    fn descriptor() -> JobDescriptor {
        JobDescriptor::new(
            "my::Job",
            "my::Job#ROOT",
            carrier(),
            Topology::map_only(DEFAULT_INPUT_FORMAT, "ScanDispatcher"),
        )
    }

    #[test]
    fn test_job_name() {
        assert_eq!(descriptor().job_name(), "ScanDispatcher[my::Job]");
    }

    #[test]
    fn test_map_only_topology() {
        let topology = Topology::map_only("x", "m");
        assert!(topology.is_map_only());
        assert_eq!(topology.reduce_tasks, 0);
        assert_eq!(topology.output, OutputSink::Discard);
    }

    #[test]
    fn test_environment_layout() {
        let env = descriptor().environment();
        assert_eq!(env.get(JOB_CLASS_KEY).map(String::as_str), Some("my::Job"));
        assert_eq!(
            env.get(JOB_CONFIG_ROOT_KEY).map(String::as_str),
            Some("my::Job#ROOT")
        );
        assert_eq!(
            env.get("scan.job.config.batchSize").map(String::as_str),
            Some("500")
        );
        assert_eq!(env.len(), 3);
    }

    #[test]
    fn test_settings_cannot_override_reserved_keys() {
        let mut settings = BTreeMap::new();
        settings.insert("input.partitioner".to_string(), "murmur3".to_string());
        settings.insert(JOB_CLASS_KEY.to_string(), "evil::Job".to_string());
        settings.insert("scan.job.config.extra".to_string(), "1".to_string());

        let env = descriptor().with_settings(&settings).environment();
        assert_eq!(env.get(JOB_CLASS_KEY).map(String::as_str), Some("my::Job"));
        assert_eq!(
            env.get("input.partitioner").map(String::as_str),
            Some("murmur3")
        );
        assert!(!env.contains_key("scan.job.config.extra"));
    }

    #[test]
    fn test_json_is_stable() {
        let first = descriptor().to_json().unwrap();
        let second = descriptor().to_json().unwrap();
        assert_eq!(first, second);
        assert!(first.contains("\"output\": \"discard\""));
    }
}
