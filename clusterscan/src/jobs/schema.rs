//! Built-in configuration schema.
//!
//! ```text
//! clusterscan
//! ├── client
//! │   └── progress       boolean       local          (default false)
//! └── scan
//!     ├── batchSize      integer       transportable  (default 100)
//!     ├── secretToken    string        masked
//!     └── count
//!         ├── key-prefix    string       transportable  (default "")
//!         ├── columns       string-list  transportable
//!         └── reject-empty  boolean      transportable  (default false)
//! ```
//!
//! `client` holds settings for the submitting process. It sits outside every
//! job root, so its options are never considered for transport.

use std::sync::Arc;

use crate::config::{ConfigSchema, Mutability, OptionSpec, SchemaBuilder, SchemaError, ValueType};

/// Name of the built-in schema root.
pub const SCHEMA_ROOT: &str = "clusterscan";

/// Path of the option that turns on progress reporting while waiting.
pub const CLIENT_PROGRESS: &str = "client.progress";

/// Default number of records per batch.
pub const DEFAULT_BATCH_SIZE: i64 = 100;

/// Builds the built-in schema.
pub fn builtin_schema() -> Result<Arc<ConfigSchema>, SchemaError> {
    let mut builder = SchemaBuilder::new(SCHEMA_ROOT);

    let client = builder.namespace(builder.root(), "client", "Submitting process settings")?;
    builder.option(
        client,
        OptionSpec::new("progress", ValueType::Boolean, Mutability::Local)
            .with_default(false)
            .with_description("Report job state at info level while waiting for the job"),
    )?;

    let scan = builder.namespace(builder.root(), "scan", "Scan job settings")?;
    builder.option(
        scan,
        OptionSpec::new("batchSize", ValueType::Integer, Mutability::Transportable)
            .with_default(DEFAULT_BATCH_SIZE)
            .with_description("Records processed between batch checkpoints"),
    )?;
    builder.option(
        scan,
        OptionSpec::new("secretToken", ValueType::String, Mutability::Masked)
            .with_description("Credential for the scanned store; never leaves this process"),
    )?;

    let count = builder.namespace(scan, "count", "Record counting settings")?;
    builder.option(
        count,
        OptionSpec::new("key-prefix", ValueType::String, Mutability::Transportable)
            .with_default("")
            .with_description("Only count records whose key starts with this prefix"),
    )?;
    builder.option(
        count,
        OptionSpec::new("columns", ValueType::StringList, Mutability::Transportable)
            .with_description("Count records whose value mentions each of these columns"),
    )?;
    builder.option(
        count,
        OptionSpec::new("reject-empty", ValueType::Boolean, Mutability::Transportable)
            .with_default(false)
            .with_description("Treat records with an empty value as failures"),
    )?;

    Ok(builder.build())
}
