//! Run command - scan a directory of partitions on the local substrate.
//!
//! Each regular file in the input directory is one partition, and each
//! non-empty line is one record. A tab separates the record key from its
//! value; lines without a tab are keys with an empty value.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use clusterscan::config::{load_configuration, Configuration};
use clusterscan::job::{Record, SchemaProvider, TypeRegistry};
use clusterscan::jobs::{builtin_registry, RecordCountJob, CLIENT_PROGRESS};
use clusterscan::metrics::ScanMetrics;
use clusterscan::runner::{ScanRunner, ScanRunnerConfig};
use clusterscan::substrate::{LocalSubstrate, LocalSubstrateConfig, Partition};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::CliError;

/// Arguments for the run command.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Directory of partition files
    #[arg(long)]
    pub input: PathBuf,

    /// Registered name of the job to run
    #[arg(long, default_value = <RecordCountJob as SchemaProvider>::TYPE_NAME)]
    pub job: String,

    /// Configuration root reference in the form <type>#<field>
    #[arg(long, default_value = RecordCountJob::ROOT_REFERENCE)]
    pub root: String,

    /// INI configuration file
    #[arg(long)]
    pub conf: Option<PathBuf>,

    /// Override a configuration option (PATH=VALUE, repeatable)
    #[arg(long = "set", value_name = "PATH=VALUE")]
    pub overrides: Vec<String>,

    /// Add a substrate setting to the job environment (KEY=VALUE, repeatable)
    #[arg(long = "setting", value_name = "KEY=VALUE")]
    pub settings: Vec<String>,

    /// Maximum number of partitions scanned at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Print the job environment instead of submitting the job
    #[arg(long)]
    pub dry_run: bool,

    /// With --dry-run, print the whole descriptor as JSON
    #[arg(long, requires = "dry_run")]
    pub json: bool,
}

/// Run the scan command.
pub async fn run(args: RunArgs, interrupt: &CancellationToken) -> Result<(), CliError> {
    let registry = builtin_registry()?;
    let config = build_configuration(&registry, args.conf.as_deref(), &args.overrides)?;
    let job = registry
        .instantiate(&args.job)
        .map_err(|e| CliError::Scan(e.into()))?;

    let mut runner_config = ScanRunnerConfig::default();
    for setting in &args.settings {
        let (key, value) = split_assignment(setting)?;
        runner_config = runner_config.with_setting(key, value);
    }

    let partitions = if args.dry_run {
        Vec::new()
    } else {
        read_partitions(&args.input)?
    };

    let substrate = LocalSubstrate::new(Arc::clone(&registry), partitions)
        .with_config(substrate_config(&config, args.concurrency)?);
    let runner =
        ScanRunner::new(Arc::clone(&registry), Arc::new(substrate)).with_config(runner_config);

    if args.dry_run {
        let descriptor = runner.prepare(job.as_ref(), &config, &args.root)?;
        if args.json {
            let json = descriptor.to_json().map_err(|e| {
                CliError::InvalidArgument(format!("Failed to render descriptor: {}", e))
            })?;
            println!("{}", json);
        } else {
            println!("# {}", descriptor.job_name());
            for (key, value) in descriptor.environment() {
                println!("{}={}", key, value);
            }
        }
        return Ok(());
    }

    info!(job = %args.job, input = %args.input.display(), "Starting scan");
    let metrics = runner
        .run(job.as_ref(), &config, &args.root, interrupt)
        .await?;

    print_metrics(&metrics);
    Ok(())
}

/// Loads the configuration file, if any, and applies `--set` overrides.
fn build_configuration(
    registry: &TypeRegistry,
    conf: Option<&Path>,
    overrides: &[String],
) -> Result<Configuration, CliError> {
    let root = registry.schema().root();
    let mut config = match conf {
        Some(path) => load_configuration(path, root)?,
        None => Configuration::new(root),
    };

    for assignment in overrides {
        let (path, raw) = split_assignment(assignment)?;
        let option = config.root().resolve_option(path)?;
        let value = option.value_type().parse_human(raw).map_err(|reason| {
            CliError::InvalidArgument(format!("Invalid value for '{}': {}", path, reason))
        })?;
        config.set(path, value)?;
    }

    Ok(config)
}

/// Local substrate settings from `--concurrency` and the `client` options.
fn substrate_config(
    config: &Configuration,
    concurrency: Option<usize>,
) -> Result<LocalSubstrateConfig, CliError> {
    let mut substrate_config = LocalSubstrateConfig {
        report_progress: config.get_bool(CLIENT_PROGRESS)?,
        ..LocalSubstrateConfig::default()
    };
    if let Some(concurrency) = concurrency {
        if concurrency == 0 {
            return Err(CliError::InvalidArgument(
                "--concurrency must be at least 1".to_string(),
            ));
        }
        substrate_config.max_concurrent_tasks = concurrency;
    }
    Ok(substrate_config)
}

fn split_assignment(assignment: &str) -> Result<(&str, &str), CliError> {
    match assignment.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value)),
        _ => Err(CliError::InvalidArgument(format!(
            "Expected KEY=VALUE, got '{}'",
            assignment
        ))),
    }
}

/// Reads every regular file in `dir` as a partition, in file name order.
fn read_partitions(dir: &Path) -> Result<Vec<Partition>, CliError> {
    let read_error = |path: &Path, error| CliError::InputRead {
        path: path.display().to_string(),
        error,
    };

    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| read_error(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    let mut partitions = Vec::with_capacity(paths.len());
    for path in paths {
        let content = fs::read_to_string(&path).map_err(|e| read_error(&path, e))?;
        let records = parse_records(&content);
        let id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        debug!(partition = %id, records = records.len(), "Read partition");
        partitions.push(Partition::new(id, records));
    }

    info!(partitions = partitions.len(), "Read input partitions");
    Ok(partitions)
}

fn parse_records(content: &str) -> Vec<Record> {
    content
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| match line.split_once('\t') {
            Some((key, value)) => Record::new(key, value),
            None => Record::new(line, ""),
        })
        .collect()
}

fn print_metrics(metrics: &ScanMetrics) {
    println!("Scan succeeded");
    for (name, value) in metrics.standard() {
        println!("  {:<24} {}", name, value);
    }
    for (name, value) in metrics.custom() {
        println!("  {:<24} {}", name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_records() {
        let records = parse_records("a\t1\nb\n\nc\tx\ty\n");
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].key, "a");
        assert_eq!(records[0].value, "1");
        assert_eq!(records[1].value, "");
        assert_eq!(records[2].value, "x\ty");
    }

    #[test]
    fn test_read_partitions_in_name_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("part-1"), "k3\tv\n").unwrap();
        fs::write(dir.path().join("part-0"), "k1\tv\nk2\tv\n").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let partitions = read_partitions(dir.path()).unwrap();

        assert_eq!(partitions.len(), 2);
        assert_eq!(partitions[0].id, "part-0");
        assert_eq!(partitions[0].records.len(), 2);
        assert_eq!(partitions[1].id, "part-1");
    }

    #[test]
    fn test_read_partitions_missing_dir() {
        let dir = TempDir::new().unwrap();
        let result = read_partitions(&dir.path().join("absent"));
        assert!(matches!(result, Err(CliError::InputRead { .. })));
    }

    #[test]
    fn test_split_assignment() {
        assert_eq!(split_assignment("a.b=1").unwrap(), ("a.b", "1"));
        assert_eq!(split_assignment("k=x=y").unwrap(), ("k", "x=y"));
        assert!(split_assignment("novalue").is_err());
        assert!(split_assignment("=1").is_err());
    }

    #[test]
    fn test_overrides_are_typed() {
        let registry = builtin_registry().unwrap();
        let overrides = vec![
            "scan.batchSize=500".to_string(),
            "scan.count.columns=email, phone".to_string(),
        ];

        let config = build_configuration(&registry, None, &overrides).unwrap();

        assert_eq!(config.get_integer("scan.batchSize").unwrap(), 500);
        assert_eq!(
            config.get_string_list("scan.count.columns").unwrap(),
            vec!["email".to_string(), "phone".to_string()]
        );
    }

    #[test]
    fn test_override_with_bad_value() {
        let registry = builtin_registry().unwrap();
        let overrides = vec!["scan.batchSize=lots".to_string()];
        let result = build_configuration(&registry, None, &overrides);
        assert!(matches!(result, Err(CliError::InvalidArgument(_))));
    }

    #[test]
    fn test_substrate_config_reads_client_progress() {
        let registry = builtin_registry().unwrap();
        let quiet = build_configuration(&registry, None, &[]).unwrap();
        assert!(!substrate_config(&quiet, None).unwrap().report_progress);

        let overrides = vec![format!("{}=yes", CLIENT_PROGRESS)];
        let verbose = build_configuration(&registry, None, &overrides).unwrap();
        let substrate = substrate_config(&verbose, Some(2)).unwrap();
        assert!(substrate.report_progress);
        assert_eq!(substrate.max_concurrent_tasks, 2);
    }

    #[test]
    fn test_substrate_config_rejects_zero_concurrency() {
        let registry = builtin_registry().unwrap();
        let config = build_configuration(&registry, None, &[]).unwrap();
        assert!(matches!(
            substrate_config(&config, Some(0)),
            Err(CliError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_client_progress_does_not_block_submission() {
        let registry = builtin_registry().unwrap();
        let overrides = vec![format!("{}=true", CLIENT_PROGRESS)];
        let config = build_configuration(&registry, None, &overrides).unwrap();
        let substrate = LocalSubstrate::new(Arc::clone(&registry), Vec::new());
        let runner = ScanRunner::new(Arc::clone(&registry), Arc::new(substrate));
        let job = RecordCountJob::new();

        let descriptor = runner
            .prepare(&job, &config, RecordCountJob::ROOT_REFERENCE)
            .unwrap();
        assert!(!descriptor
            .environment()
            .keys()
            .any(|key| key.ends_with("progress")));
    }
}
