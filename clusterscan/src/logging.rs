//! Logging infrastructure for clusterscan.
//!
//! Provides structured logging with file output and console output:
//! - Writes to `logs/clusterscan.log` (cleared on session start)
//! - Also prints to stderr, keeping stdout free for command output
//! - Configurable via RUST_LOG environment variable

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard will flush and close the log file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Initialize logging system.
///
/// Creates the log directory if needed, clears the previous log file, and
/// sets up dual output to both file and stderr.
///
/// # Arguments
///
/// * `log_dir` - Directory for log files (e.g., "logs")
/// * `log_file` - Log filename (e.g., "clusterscan.log")
/// * `debug` - Default to `debug` level instead of `info` when RUST_LOG is unset
///
/// # Errors
///
/// Returns error if log directory cannot be created or log file cannot be cleared
pub fn init_logging(
    log_dir: &str,
    log_file: &str,
    debug: bool,
) -> Result<LoggingGuard, io::Error> {
    prepare_log_file(Path::new(log_dir), log_file)?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_target(true);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(true)
        .with_target(false)
        .compact();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(debug)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Creates `log_dir` if needed and truncates `log_file` inside it, so each
/// session starts with an empty log.
fn prepare_log_file(log_dir: &Path, log_file: &str) -> Result<PathBuf, io::Error> {
    fs::create_dir_all(log_dir)?;
    let log_path = log_dir.join(log_file);
    fs::write(&log_path, "")?;
    Ok(log_path)
}

/// Filter directive used when RUST_LOG is not set.
pub fn default_filter(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "info"
    }
}

/// Get default log directory path.
pub fn default_log_dir() -> &'static str {
    "logs"
}

/// Get default log file name.
pub fn default_log_file() -> &'static str {
    "clusterscan.log"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        assert_eq!(default_log_dir(), "logs");
        assert_eq!(default_log_file(), "clusterscan.log");
    }

    #[test]
    fn test_default_filter() {
        assert_eq!(default_filter(false), "info");
        assert_eq!(default_filter(true), "debug");
    }

    #[test]
    fn test_prepare_log_file_creates_directory() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let log_dir = temp_dir.path().join("nested/logs");

        let log_path = prepare_log_file(&log_dir, "test.log").unwrap();

        assert!(log_dir.is_dir());
        assert_eq!(log_path, log_dir.join("test.log"));
        assert_eq!(fs::read_to_string(&log_path).unwrap(), "");
    }

    #[test]
    fn test_prepare_log_file_clears_previous_session() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let log_path = temp_dir.path().join("test.log");
        fs::write(&log_path, "old log data").unwrap();

        prepare_log_file(temp_dir.path(), "test.log").unwrap();

        assert_eq!(fs::read_to_string(&log_path).unwrap(), "");
    }
}
