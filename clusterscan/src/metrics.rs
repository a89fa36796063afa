//! Substrate-independent scan metrics.
//!
//! Remote tasks record named integer counters while a job runs. The
//! dispatcher publishes them to the execution substrate in two counter
//! groups:
//!
//! - [`CUSTOM_GROUP`]: counters defined by the scan job itself
//! - [`STANDARD_GROUP`]: per-record outcomes recorded by the dispatcher
//!   ([`StandardMetric`])
//!
//! After a successful run the substrate's counters are folded back into a
//! [`ScanMetrics`]. Counters in any other group belong to the substrate and
//! are dropped.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::substrate::Counter;

/// Counter group for job-defined counters.
pub const CUSTOM_GROUP: &str = "scan.dispatcher.custom";

/// Counter group for dispatcher-recorded counters.
pub const STANDARD_GROUP: &str = "scan.dispatcher.standard";

/// Counters recorded by the dispatcher for every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardMetric {
    /// Records processed without error.
    Success,
    /// Records whose processing returned an error.
    Failure,
}

impl StandardMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }
}

impl fmt::Display for StandardMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named integer counters aggregated across all tasks of a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanMetrics {
    custom: BTreeMap<String, i64>,
    standard: BTreeMap<String, i64>,
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a job-defined counter, or 0 if it was never incremented.
    pub fn get(&self, name: &str) -> i64 {
        self.custom.get(name).copied().unwrap_or(0)
    }

    pub fn get_standard(&self, metric: StandardMetric) -> i64 {
        self.standard.get(metric.as_str()).copied().unwrap_or(0)
    }

    pub fn increment(&mut self, name: &str, delta: i64) {
        *self.custom.entry(name.to_string()).or_insert(0) += delta;
    }

    pub fn increment_standard(&mut self, metric: StandardMetric, delta: i64) {
        *self
            .standard
            .entry(metric.as_str().to_string())
            .or_insert(0) += delta;
    }

    /// Job-defined counters in name order.
    pub fn custom(&self) -> impl Iterator<Item = (&str, i64)> {
        self.custom.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Dispatcher-recorded counters in name order.
    pub fn standard(&self) -> impl Iterator<Item = (&str, i64)> {
        self.standard.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.custom.is_empty() && self.standard.is_empty()
    }

    /// Adds every counter of `other` into `self`.
    pub fn merge(&mut self, other: &ScanMetrics) {
        for (name, value) in &other.custom {
            *self.custom.entry(name.clone()).or_insert(0) += value;
        }
        for (name, value) in &other.standard {
            *self.standard.entry(name.clone()).or_insert(0) += value;
        }
    }

    /// Publishes the metrics as substrate counters.
    pub fn to_counters(&self) -> Vec<Counter> {
        let custom = self
            .custom
            .iter()
            .map(|(name, value)| Counter::new(CUSTOM_GROUP, name.as_str(), *value));
        let standard = self
            .standard
            .iter()
            .map(|(name, value)| Counter::new(STANDARD_GROUP, name.as_str(), *value));
        custom.chain(standard).collect()
    }

    /// Folds substrate counters into metrics.
    ///
    /// Counters outside the dispatcher's groups are ignored. Repeated
    /// counters are summed.
    pub fn from_counters<'a>(counters: impl IntoIterator<Item = &'a Counter>) -> Self {
        let mut metrics = Self::default();
        for counter in counters {
            let target = match counter.group.as_str() {
                CUSTOM_GROUP => &mut metrics.custom,
                STANDARD_GROUP => &mut metrics.standard,
                _ => continue,
            };
            *target.entry(counter.name.clone()).or_insert(0) += counter.value;
        }
        metrics
    }
}
