//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`run`] - Run a scan job on the local substrate
//! - [`schema`] - Built-in schema inspection (options, refs)

pub mod run;
pub mod schema;
