//! Record counting scan job.

use std::sync::Arc;

use crate::config::{ConfigError, ConfigSchema, Configuration};
use crate::job::{FieldValue, Record, ScanJob, ScanJobError, SchemaProvider};
use crate::metrics::ScanMetrics;

/// Counts the records of a dataset.
///
/// Configured from the `scan` namespace of the built-in schema, referenced
/// as `clusterscan::jobs::RecordCountJob#SCAN_ROOT`.
///
/// # Counters
///
/// | Name | Meaning |
/// |------|---------|
/// | `records_scanned` | records whose key matched `count.key-prefix` |
/// | `records_skipped` | records whose key did not match |
/// | `bytes_scanned` | key and value bytes of scanned records |
/// | `batches` | completed batches of `batchSize` scanned records |
/// | `column:<name>` | scanned records whose value contains `<name>` |
#[derive(Debug, Default)]
pub struct RecordCountJob {
    key_prefix: String,
    columns: Vec<String>,
    reject_empty: bool,
    batch_size: i64,
    in_batch: i64,
}

impl RecordCountJob {
    pub const RECORDS_SCANNED: &'static str = "records_scanned";
    pub const RECORDS_SKIPPED: &'static str = "records_skipped";
    pub const BYTES_SCANNED: &'static str = "bytes_scanned";
    pub const BATCHES: &'static str = "batches";

    /// Reference to the job's configuration root.
    pub const ROOT_REFERENCE: &'static str = "clusterscan::jobs::RecordCountJob#SCAN_ROOT";

    pub fn new() -> Self {
        Self::default()
    }

    fn column_counter(column: &str) -> String {
        format!("column:{}", column)
    }
}

impl ScanJob for RecordCountJob {
    fn name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn worker_start(
        &mut self,
        config: &Configuration,
        _metrics: &mut ScanMetrics,
    ) -> Result<(), ScanJobError> {
        self.key_prefix = config.get_string("count.key-prefix")?;
        self.reject_empty = config.get_bool("count.reject-empty")?;
        self.columns = match config.get("count.columns")? {
            Some(value) => value.as_list().map(<[String]>::to_vec).unwrap_or_default(),
            None => Vec::new(),
        };
        self.batch_size = config.get_integer("batchSize")?;
        if self.batch_size <= 0 {
            return Err(ScanJobError::new(format!(
                "batchSize must be positive, got {}",
                self.batch_size
            )));
        }
        self.in_batch = 0;
        Ok(())
    }

    fn process(
        &mut self,
        record: &Record,
        metrics: &mut ScanMetrics,
    ) -> Result<(), ScanJobError> {
        if !record.key.starts_with(&self.key_prefix) {
            metrics.increment(Self::RECORDS_SKIPPED, 1);
            return Ok(());
        }
        if self.reject_empty && record.value.is_empty() {
            return Err(ScanJobError::new(format!(
                "record '{}' has an empty value",
                record.key
            )));
        }

        metrics.increment(Self::RECORDS_SCANNED, 1);
        metrics.increment(
            Self::BYTES_SCANNED,
            (record.key.len() + record.value.len()) as i64,
        );
        for column in &self.columns {
            if record.value.contains(column.as_str()) {
                metrics.increment(&Self::column_counter(column), 1);
            }
        }

        self.in_batch += 1;
        if self.in_batch == self.batch_size {
            metrics.increment(Self::BATCHES, 1);
            self.in_batch = 0;
        }
        Ok(())
    }

    fn worker_end(&mut self, metrics: &mut ScanMetrics) -> Result<(), ScanJobError> {
        // Partial final batch
        if self.in_batch > 0 {
            metrics.increment(Self::BATCHES, 1);
            self.in_batch = 0;
        }
        Ok(())
    }
}

impl SchemaProvider for RecordCountJob {
    const TYPE_NAME: &'static str = "clusterscan::jobs::RecordCountJob";

    fn schema_fields(
        schema: &Arc<ConfigSchema>,
    ) -> Result<Vec<(&'static str, FieldValue)>, ConfigError> {
        Ok(vec![
            (
                "SCAN_ROOT",
                FieldValue::Namespace(schema.root().resolve_namespace("scan")?),
            ),
            (
                "COUNT_ROOT",
                FieldValue::Namespace(schema.root().resolve_namespace("scan.count")?),
            ),
            ("DEFAULT_BATCH_SIZE", FieldValue::Other { kind: "integer" }),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::builtin_schema;

    fn configured(job: &mut RecordCountJob, config: &Configuration) -> ScanMetrics {
        let mut metrics = ScanMetrics::new();
        job.worker_start(config, &mut metrics).unwrap();
        metrics
    }

    fn scan_config() -> Configuration {
        let schema = builtin_schema().unwrap();
        Configuration::new(schema.root().resolve_namespace("scan").unwrap())
    }

    #[test]
    fn test_counts_records_and_bytes() {
        let mut job = RecordCountJob::new();
        let mut metrics = configured(&mut job, &scan_config());

        job.process(&Record::new("ab", "cde"), &mut metrics).unwrap();
        job.process(&Record::new("f", ""), &mut metrics).unwrap();
        job.worker_end(&mut metrics).unwrap();

        assert_eq!(metrics.get(RecordCountJob::RECORDS_SCANNED), 2);
        assert_eq!(metrics.get(RecordCountJob::BYTES_SCANNED), 6);
        assert_eq!(metrics.get(RecordCountJob::BATCHES), 1);
    }

    #[test]
    fn test_key_prefix_and_columns() {
        let config = scan_config()
            .with("count.key-prefix", "user:")
            .unwrap()
            .with(
                "count.columns",
                vec!["email".to_string(), "phone".to_string()],
            )
            .unwrap();
        let mut job = RecordCountJob::new();
        let mut metrics = configured(&mut job, &config);

        job.process(&Record::new("user:1", "name,email"), &mut metrics)
            .unwrap();
        job.process(&Record::new("user:2", "email,phone"), &mut metrics)
            .unwrap();
        job.process(&Record::new("order:9", "email"), &mut metrics)
            .unwrap();

        assert_eq!(metrics.get(RecordCountJob::RECORDS_SCANNED), 2);
        assert_eq!(metrics.get(RecordCountJob::RECORDS_SKIPPED), 1);
        assert_eq!(metrics.get("column:email"), 2);
        assert_eq!(metrics.get("column:phone"), 1);
    }

    #[test]
    fn test_batches() {
        let config = scan_config().with("batchSize", 2).unwrap();
        let mut job = RecordCountJob::new();
        let mut metrics = configured(&mut job, &config);

        for i in 0..5 {
            job.process(&Record::new(format!("k{}", i), "v"), &mut metrics)
                .unwrap();
        }
        job.worker_end(&mut metrics).unwrap();

        assert_eq!(metrics.get(RecordCountJob::BATCHES), 3);
    }

    #[test]
    fn test_reject_empty() {
        let config = scan_config().with("count.reject-empty", true).unwrap();
        let mut job = RecordCountJob::new();
        let mut metrics = configured(&mut job, &config);

        assert!(job.process(&Record::new("k", ""), &mut metrics).is_err());
        assert_eq!(metrics.get(RecordCountJob::RECORDS_SCANNED), 0);
    }

    #[test]
    fn test_non_positive_batch_size_fails_start() {
        let config = scan_config().with("batchSize", 0).unwrap();
        let mut job = RecordCountJob::new();
        let mut metrics = ScanMetrics::new();
        assert!(job.worker_start(&config, &mut metrics).is_err());
    }
}
