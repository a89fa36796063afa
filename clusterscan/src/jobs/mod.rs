//! Built-in schema and scan jobs.

mod record_count;
mod schema;

pub use record_count::RecordCountJob;
pub use schema::{builtin_schema, CLIENT_PROGRESS, DEFAULT_BATCH_SIZE, SCHEMA_ROOT};

use std::sync::Arc;

use thiserror::Error;

use crate::config::{ConfigError, SchemaError};
use crate::job::TypeRegistry;

/// Errors from setting up the built-in registry.
#[derive(Debug, Error)]
pub enum BuiltinError {
    #[error("invalid built-in schema: {0}")]
    Schema(#[from] SchemaError),

    #[error("invalid built-in job fields: {0}")]
    Fields(#[from] ConfigError),
}

/// Registers the built-in jobs.
pub fn register_builtin(registry: &mut TypeRegistry) -> Result<(), ConfigError> {
    registry.register_job::<RecordCountJob>()
}

/// Builds a registry over the built-in schema with the built-in jobs.
pub fn builtin_registry() -> Result<Arc<TypeRegistry>, BuiltinError> {
    let mut registry = TypeRegistry::new(builtin_schema()?);
    register_builtin(&mut registry)?;
    Ok(Arc::new(registry))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_resolves_record_count_root() {
        let registry = builtin_registry().unwrap();
        let root = registry
            .resolve_root(RecordCountJob::ROOT_REFERENCE)
            .unwrap();
        assert_eq!(root.path(), "scan");
        assert!(registry
            .check_constructible("clusterscan::jobs::RecordCountJob")
            .is_ok());
    }
}
