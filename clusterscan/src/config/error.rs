//! Error types for schema declaration and configuration access.

use thiserror::Error;

use super::value::ValueType;

/// Errors raised while declaring a configuration schema.
///
/// These are programming mistakes in the schema definition itself and are
/// surfaced when the process builds its schema at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Two entities under the same namespace share a name.
    #[error("'{name}' is already declared under namespace '{parent}'")]
    DuplicateName { parent: String, name: String },

    /// Element names must be non-empty and free of path separators.
    #[error("invalid element name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// An option's default value does not match its declared type.
    #[error("default for option '{name}' does not match declared type: {reason}")]
    DefaultTypeMismatch { name: String, reason: String },

    /// The namespace id does not belong to this builder.
    #[error("namespace id {0} is not a namespace of this schema")]
    UnknownNamespace(usize),
}

/// Errors raised while resolving paths or reading and writing values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No element exists at some point along the path.
    #[error("unknown configuration path '{path}'")]
    UnknownPath { path: String },

    /// The path resolves to a namespace where an option was expected.
    #[error("'{path}' is a namespace, not an option")]
    NotAnOption { path: String },

    /// The path resolves to an option where a namespace was expected.
    #[error("'{path}' is an option, not a namespace")]
    NotANamespace { path: String },

    /// A value's type does not match the option's declared type.
    #[error("type mismatch for '{path}': expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: ValueType,
        found: ValueType,
    },

    /// A value could not be accepted or decoded for the option.
    #[error("invalid value for '{path}': {reason}")]
    InvalidValue { path: String, reason: String },

    /// The option has neither a configured value nor a default.
    #[error("no value configured for '{path}' and the option has no default")]
    Missing { path: String },
}
