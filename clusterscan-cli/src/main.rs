//! clusterscan CLI - Command-line interface
//!
//! This binary submits scan jobs through the clusterscan library and
//! inspects the built-in configuration schema.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use clusterscan::logging::{default_log_dir, default_log_file, init_logging};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use commands::run::RunArgs;
use commands::schema::SchemaCommands;
use error::CliError;

#[derive(Parser)]
#[command(name = "clusterscan")]
#[command(version = clusterscan::VERSION)]
#[command(about = "Submit scan jobs over partitioned datasets", long_about = None)]
struct Cli {
    /// Enable debug-level logging (overridden by RUST_LOG)
    #[arg(long, global = true)]
    debug: bool,

    /// Directory for the log file
    #[arg(long, global = true, default_value = default_log_dir())]
    log_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect the built-in configuration schema
    #[command(subcommand)]
    Schema(SchemaCommands),

    /// Run a scan job over a directory of partitions
    Run(RunArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = dispatch(cli).await {
        e.exit();
    }
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Schema(command) => commands::schema::run(command),
        Commands::Run(args) => {
            let _guard = init_logging(&cli.log_dir, default_log_file(), cli.debug)
                .map_err(|e| CliError::LoggingInit(e.to_string()))?;
            info!("clusterscan v{}", clusterscan::VERSION);

            let interrupt = CancellationToken::new();
            spawn_interrupt_handler(interrupt.clone());

            commands::run::run(args, &interrupt).await
        }
    }
}

/// Cancels `interrupt` on Ctrl-C.
fn spawn_interrupt_handler(interrupt: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, stopping scan job");
                interrupt.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });
}
