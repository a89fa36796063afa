//! Schema inspection CLI commands.
//!
//! Provides `schema options`, `schema refs` and `schema check` for browsing
//! the built-in configuration schema and validating configuration files
//! against it.

use std::path::PathBuf;

use clap::Subcommand;
use clusterscan::config::{load_configuration, Mutability};
use clusterscan::job::{encode_reference, FieldValue};
use clusterscan::jobs::builtin_registry;
use clusterscan::runner::TRANSPORTABLE;

use crate::error::CliError;

/// Schema subcommands.
#[derive(Debug, Subcommand)]
pub enum SchemaCommands {
    /// List every declared option
    Options {
        /// Only list options under this namespace path (e.g., scan.count)
        #[arg(long)]
        namespace: Option<String>,
    },

    /// List the configuration root references of registered jobs
    Refs,

    /// Validate a configuration file against the schema
    Check {
        /// Path to an INI configuration file
        conf: PathBuf,
    },
}

/// Run a schema subcommand.
pub fn run(command: SchemaCommands) -> Result<(), CliError> {
    match command {
        SchemaCommands::Options { namespace } => run_options(namespace.as_deref()),
        SchemaCommands::Refs => run_refs(),
        SchemaCommands::Check { conf } => run_check(&conf),
    }
}

fn run_options(namespace: Option<&str>) -> Result<(), CliError> {
    let registry = builtin_registry()?;
    let root = registry.schema().root();
    let options = match namespace {
        Some(path) => root.resolve_namespace(path)?.options(),
        None => root.options(),
    };

    println!(
        "{:<32} {:<12} {:<14} {:<10}",
        "OPTION", "TYPE", "MUTABILITY", "DEFAULT"
    );
    for option in options {
        let default = option
            .default_value()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<32} {:<12} {:<14} {:<10}",
            option.path(),
            option.value_type().as_str(),
            option.mutability().as_str(),
            default
        );
        if !option.description().is_empty() {
            println!("    {}", option.description());
        }
    }

    Ok(())
}

fn run_refs() -> Result<(), CliError> {
    let registry = builtin_registry()?;

    for job in registry.job_names() {
        println!("{}", job);
        let Some(fields) = registry.fields(job) else {
            continue;
        };
        for (field, value) in fields {
            match value {
                FieldValue::Namespace(ns) => println!(
                    "  {}  -> {} ({} options)",
                    encode_reference(job, field),
                    ns.path(),
                    ns.options().len()
                ),
                FieldValue::Other { kind } => {
                    println!("  {}  ({})", encode_reference(job, field), kind)
                }
            }
        }
    }

    Ok(())
}

fn run_check(path: &std::path::Path) -> Result<(), CliError> {
    let registry = builtin_registry()?;
    let config = load_configuration(path, registry.schema().root())?;

    println!("{}: {} option(s) set", path.display(), config.len());
    for (option_path, value) in config.entries() {
        let option = config.root().resolve_option(option_path)?;
        let marker = if TRANSPORTABLE.contains(&option.mutability()) {
            ""
        } else if option.mutability() == Mutability::Masked {
            "  [masked, never sent]"
        } else {
            "  [local, never sent]"
        };
        println!("  {} = {}{}", option_path, value, marker);
    }

    Ok(())
}
