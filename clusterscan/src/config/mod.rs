//! Typed, namespaced configuration.
//!
//! The configuration model has three layers:
//!
//! - **Schema** ([`SchemaBuilder`], [`ConfigSchema`]): a tree of namespaces
//!   and typed options, declared once at startup and immutable afterwards.
//! - **Configuration** ([`Configuration`]): a populated instance of the
//!   schema, rooted at a namespace, with type-checked values.
//! - **Transport** ([`subset`], [`TransportableConfiguration`]): the flat,
//!   string-encoded subset of a configuration that may be sent to a remote
//!   job.
//!
//! # Example
//!
//! ```
//! use clusterscan::config::{
//!     subset, Configuration, Mutability, OptionSpec, SchemaBuilder, ValueType,
//! };
//!
//! let mut builder = SchemaBuilder::new("root");
//! let scan = builder.namespace(builder.root(), "scan", "").unwrap();
//! builder
//!     .option(
//!         scan,
//!         OptionSpec::new("batchSize", ValueType::Integer, Mutability::Transportable)
//!             .with_default(100),
//!     )
//!     .unwrap();
//! let schema = builder.build();
//!
//! let mut config = Configuration::new(schema.root());
//! config.set("scan.batchSize", 500).unwrap();
//!
//! let scan_ns = schema.root().resolve_namespace("scan").unwrap();
//! let carrier = subset(&scan_ns, &[Mutability::Transportable], &config).unwrap();
//! assert_eq!(carrier.get("batchSize"), Some("500"));
//! ```

mod configuration;
mod error;
mod file;
mod schema;
mod transport;
mod value;

pub use configuration::Configuration;
pub use error::{ConfigError, SchemaError};
pub use file::{load_configuration, parse_configuration, ConfigFileError};
pub use schema::{
    join_path, strip_path_prefix, ConfigElement, ConfigNamespace, ConfigOption, ConfigSchema,
    Mutability, NamespaceId, OptionSpec, SchemaBuilder, PATH_SEPARATOR, ROOT_SEPARATOR,
};
pub use transport::{subset, SubsetError, TransportableConfiguration};
pub use value::{ConfigValue, ValueType};
