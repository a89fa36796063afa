//! Submission-side driver.
//!
//! [`ScanRunner::run`] is the whole submission pipeline:
//!
//! ```text
//! resolve root ──► subset config ──► check job class ──► build descriptor
//!                                                              │
//!      ScanMetrics / ScanError ◄── translate ◄── wait ◄── submit
//! ```
//!
//! Everything up to the descriptor is validated locally, so caller mistakes
//! never reach the substrate.

mod descriptor;
mod driver;
mod error;
mod translate;

pub use descriptor::{
    JobDescriptor, OutputSink, Topology, DEFAULT_INPUT_FORMAT, JOB_CLASS_KEY, JOB_CONFIG_PREFIX,
    JOB_CONFIG_ROOT_KEY, RESERVED_PREFIX,
};
pub use driver::{ScanRunner, ScanRunnerConfig, TRANSPORTABLE};
pub use error::ScanError;
pub use translate::{failure_diagnostic, translate, TerminalState, GENERIC_FAILURE_DIAGNOSTIC};
