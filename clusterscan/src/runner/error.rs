//! Errors surfaced by [`ScanRunner`](super::ScanRunner).

use thiserror::Error;

use crate::config::{ConfigError, Mutability, SubsetError};
use crate::job::{MalformedReference, ResolutionError};

/// Failure of a scan job submission.
///
/// Every variant except [`JobExecution`](Self::JobExecution) and
/// [`Interrupted`](Self::Interrupted) is raised before anything is
/// submitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error(transparent)]
    MalformedReference(#[from] MalformedReference),

    #[error("configuration root type '{type_name}' not found")]
    TypeNotFound { type_name: String },

    #[error("type '{type_name}' has no field '{field_name}'")]
    FieldNotFound {
        type_name: String,
        field_name: String,
    },

    #[error("field '{type_name}#{field_name}' is {kind}, not a configuration namespace")]
    NotANamespace {
        type_name: String,
        field_name: String,
        kind: &'static str,
    },

    #[error("job class '{class}' not found")]
    JobClassNotFound { class: String },

    #[error("option '{path}' is {mutability} and may not be sent to a remote job")]
    NonTransportableOption { path: String, mutability: Mutability },

    /// A configured path could not be resolved against the job's root.
    #[error("invalid job configuration: {0}")]
    Config(#[from] ConfigError),

    /// The submitted job did not succeed.
    #[error("{diagnostic}")]
    JobExecution { diagnostic: String },

    /// The caller cancelled the wait.
    #[error("interrupted while waiting for job completion")]
    Interrupted,
}

impl ScanError {
    /// Returns true if the error was raised before submission.
    pub fn is_pre_submission(&self) -> bool {
        !matches!(self, Self::JobExecution { .. } | Self::Interrupted)
    }
}

impl From<ResolutionError> for ScanError {
    fn from(e: ResolutionError) -> Self {
        match e {
            ResolutionError::MalformedReference(e) => Self::MalformedReference(e),
            ResolutionError::TypeNotFound { type_name } => Self::TypeNotFound { type_name },
            ResolutionError::FieldNotFound {
                type_name,
                field_name,
            } => Self::FieldNotFound {
                type_name,
                field_name,
            },
            ResolutionError::NotANamespace {
                type_name,
                field_name,
                kind,
            } => Self::NotANamespace {
                type_name,
                field_name,
                kind,
            },
            ResolutionError::JobClassNotFound { class } => Self::JobClassNotFound { class },
        }
    }
}

impl From<SubsetError> for ScanError {
    fn from(e: SubsetError) -> Self {
        match e {
            SubsetError::NonTransportableOption { path, mutability } => {
                Self::NonTransportableOption { path, mutability }
            }
            SubsetError::Config(e) => Self::Config(e),
        }
    }
}
