//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use clusterscan::config::{ConfigError, ConfigFileError};
use clusterscan::jobs::BuiltinError;
use clusterscan::runner::ScanError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Built-in schema or job registration failed
    Setup(BuiltinError),
    /// Configuration file could not be loaded
    ConfigFile(ConfigFileError),
    /// A `--set` override was rejected
    Config(ConfigError),
    /// Invalid command-line argument
    InvalidArgument(String),
    /// Failed to read input partitions
    InputRead { path: String, error: std::io::Error },
    /// Scan job failed
    Scan(ScanError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Scan(ScanError::NonTransportableOption { .. }) => {
                eprintln!();
                eprintln!("Only transportable options are sent to the job.");
                eprintln!("Remove local and masked options from the job's namespace,");
                eprintln!("or move them outside the configuration root.");
            }
            CliError::Scan(ScanError::MalformedReference(_)) => {
                eprintln!();
                eprintln!("Configuration roots are referenced as <type>#<field>, e.g.:");
                eprintln!("  clusterscan::jobs::RecordCountJob#SCAN_ROOT");
            }
            CliError::Scan(ScanError::JobExecution { .. }) => {
                eprintln!();
                eprintln!("See the log file for per-partition failure details.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Setup(e) => write!(f, "Failed to set up built-in jobs: {}", e),
            CliError::ConfigFile(e) => write!(f, "Configuration error: {}", e),
            CliError::Config(e) => write!(f, "Invalid setting: {}", e),
            CliError::InvalidArgument(msg) => write!(f, "{}", msg),
            CliError::InputRead { path, error } => {
                write!(f, "Failed to read input '{}': {}", path, error)
            }
            CliError::Scan(e) => write!(f, "Scan failed: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Setup(e) => Some(e),
            CliError::ConfigFile(e) => Some(e),
            CliError::Config(e) => Some(e),
            CliError::InputRead { error, .. } => Some(error),
            CliError::Scan(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BuiltinError> for CliError {
    fn from(e: BuiltinError) -> Self {
        CliError::Setup(e)
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<ScanError> for CliError {
    fn from(e: ScanError) -> Self {
        CliError::Scan(e)
    }
}
