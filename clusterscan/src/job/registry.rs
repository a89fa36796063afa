//! Name-based lookup of job implementations and their schemas.
//!
//! Configuration schemas live next to the job code that uses them instead
//! of being shipped with each submission. A type publishes its schema
//! handles as named fields through [`SchemaProvider`], and a
//! [`TypeRegistry`] makes them reachable by name. Both sides of a submission
//! hold an equivalent registry:
//!
//! - the submitting side checks that the job name is known before
//!   submitting ([`TypeRegistry::check_constructible`]) and recovers the
//!   root namespace from the reference ([`TypeRegistry::resolve_root`]);
//! - every remote task repeats the root lookup and builds a fresh job with
//!   [`TypeRegistry::instantiate`].
//!
//! A registry is populated once at startup and shared read-only afterwards
//! (typically as `Arc<TypeRegistry>`).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use super::reference::{decode_reference, MalformedReference};
use super::scan_job::ScanJob;
use crate::config::{ConfigError, ConfigNamespace, ConfigSchema};

/// Errors from resolving names against a [`TypeRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error(transparent)]
    MalformedReference(#[from] MalformedReference),

    #[error("type '{type_name}' is not registered")]
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

    #[error("job class '{class}' cannot be constructed in this process")]
    JobClassNotFound { class: String },
}

/// The value of a named field published by a registered type.
#[derive(Clone)]
pub enum FieldValue {
    /// A configuration namespace usable as a job's configuration root.
    Namespace(ConfigNamespace),
    /// Any other kind of value, described by a short kind name.
    Other { kind: &'static str },
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Namespace(ns) => write!(f, "Namespace({})", ns.path()),
            Self::Other { kind } => write!(f, "Other({})", kind),
        }
    }
}

/// A type that publishes named schema fields.
///
/// Implemented by job types so that their configuration roots can be found
/// from a `<TYPE_NAME>#<field>` reference.
pub trait SchemaProvider {
    /// Registered name of the type.
    const TYPE_NAME: &'static str;

    /// The type's named fields, resolved against `schema`.
    fn schema_fields(schema: &Arc<ConfigSchema>)
        -> Result<Vec<(&'static str, FieldValue)>, ConfigError>;
}

/// Factory producing fresh job instances.
pub type JobConstructor = Arc<dyn Fn() -> Box<dyn ScanJob> + Send + Sync>;

struct TypeEntry {
    fields: BTreeMap<String, FieldValue>,
    constructor: Option<JobConstructor>,
}

/// Registry of named types, their schema fields and job constructors.
pub struct TypeRegistry {
    schema: Arc<ConfigSchema>,
    types: BTreeMap<String, TypeEntry>,
}

impl TypeRegistry {
    /// Creates an empty registry over `schema`.
    pub fn new(schema: Arc<ConfigSchema>) -> Self {
        Self {
            schema,
            types: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &Arc<ConfigSchema> {
        &self.schema
    }

    /// Registers a type that publishes fields but cannot be run as a job.
    ///
    /// Registering the same name again replaces its fields and keeps any
    /// constructor.
    pub fn register_type(
        &mut self,
        type_name: impl Into<String>,
        fields: impl IntoIterator<Item = (impl Into<String>, FieldValue)>,
    ) {
        let type_name = type_name.into();
        let fields: BTreeMap<String, FieldValue> =
            fields.into_iter().map(|(k, v)| (k.into(), v)).collect();
        debug!(type_name = %type_name, fields = fields.len(), "Registered type");

        let entry = self.types.entry(type_name).or_insert_with(|| TypeEntry {
            fields: BTreeMap::new(),
            constructor: None,
        });
        entry.fields = fields;
    }

    /// Registers a constructor for jobs named `type_name`.
    pub fn register_constructor(
        &mut self,
        type_name: impl Into<String>,
        constructor: JobConstructor,
    ) {
        let type_name = type_name.into();
        debug!(type_name = %type_name, "Registered job constructor");

        let entry = self.types.entry(type_name).or_insert_with(|| TypeEntry {
            fields: BTreeMap::new(),
            constructor: None,
        });
        entry.constructor = Some(constructor);
    }

    /// Registers a job type together with its schema fields.
    pub fn register_job<J>(&mut self) -> Result<(), ConfigError>
    where
        J: ScanJob + SchemaProvider + Default + 'static,
    {
        let fields = J::schema_fields(&self.schema)?;
        self.register_type(J::TYPE_NAME, fields);
        self.register_constructor(
            J::TYPE_NAME,
            Arc::new(|| Box::new(J::default()) as Box<dyn ScanJob>),
        );
        Ok(())
    }

    /// Resolves a `<type>#<field>` reference to a configuration namespace.
    pub fn resolve_root(&self, reference: &str) -> Result<ConfigNamespace, ResolutionError> {
        let (type_name, field_name) = decode_reference(reference)?;

        let entry = self
            .types
            .get(&type_name)
            .ok_or_else(|| ResolutionError::TypeNotFound {
                type_name: type_name.clone(),
            })?;

        match entry.fields.get(&field_name) {
            Some(FieldValue::Namespace(ns)) => Ok(ns.clone()),
            Some(FieldValue::Other { kind }) => Err(ResolutionError::NotANamespace {
                type_name,
                field_name,
                kind: *kind,
            }),
            None => Err(ResolutionError::FieldNotFound {
                type_name,
                field_name,
            }),
        }
    }

    /// Checks that a job named `class` can be instantiated in this process.
    pub fn check_constructible(&self, class: &str) -> Result<(), ResolutionError> {
        self.constructor(class).map(|_| ())
    }

    /// Creates a fresh instance of the job named `class`.
    pub fn instantiate(&self, class: &str) -> Result<Box<dyn ScanJob>, ResolutionError> {
        self.constructor(class).map(|constructor| constructor.as_ref()())
    }

    /// Names of all registered job types.
    pub fn job_names(&self) -> impl Iterator<Item = &str> {
        self.types
            .iter()
            .filter(|(_, entry)| entry.constructor.is_some())
            .map(|(name, _)| name.as_str())
    }

    /// Named fields of a registered type, in name order.
    pub fn fields(&self, type_name: &str) -> Option<impl Iterator<Item = (&str, &FieldValue)>> {
        self.types
            .get(type_name)
            .map(|entry| entry.fields.iter().map(|(k, v)| (k.as_str(), v)))
    }

    fn constructor(&self, class: &str) -> Result<&JobConstructor, ResolutionError> {
        self.types
            .get(class)
            .and_then(|entry| entry.constructor.as_ref())
            .ok_or_else(|| ResolutionError::JobClassNotFound {
                class: class.to_string(),
            })
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Mutability, OptionSpec, SchemaBuilder, ValueType};
    use crate::job::{Record, ScanJobError};
    use crate::metrics::ScanMetrics;

    #[derive(Default)]
    struct NoopJob;

    impl ScanJob for NoopJob {
        fn name(&self) -> &str {
            Self::TYPE_NAME
        }

        fn process(&mut self, _: &Record, _: &mut ScanMetrics) -> Result<(), ScanJobError> {
            Ok(())
        }
    }

    impl SchemaProvider for NoopJob {
        const TYPE_NAME: &'static str = "tests::NoopJob";

        fn schema_fields(
            schema: &Arc<ConfigSchema>,
        ) -> Result<Vec<(&'static str, FieldValue)>, ConfigError> {
            Ok(vec![
                ("ROOT", FieldValue::Namespace(schema.root().resolve_namespace("scan")?)),
                ("VERSION", FieldValue::Other { kind: "integer" }),
            ])
        }
    }

    fn test_registry() -> TypeRegistry {
        let mut builder = SchemaBuilder::new("root");
        let scan = builder.namespace(builder.root(), "scan", "").unwrap();
        builder
            .option(
                scan,
                OptionSpec::new("batchSize", ValueType::Integer, Mutability::Transportable),
            )
            .unwrap();
        let mut registry = TypeRegistry::new(builder.build());
        registry.register_job::<NoopJob>().unwrap();
        registry
    }

    #[test]
    fn test_resolve_root() {
        let registry = test_registry();
        let root = registry.resolve_root("tests::NoopJob#ROOT").unwrap();
        assert_eq!(root.path(), "scan");
    }

    #[test]
    fn test_resolve_root_malformed() {
        let registry = test_registry();
        assert!(matches!(
            registry.resolve_root("tests::NoopJob"),
            Err(ResolutionError::MalformedReference(_))
        ));
    }

    #[test]
    fn test_resolve_root_type_not_found() {
        let registry = test_registry();
        assert_eq!(
            registry.resolve_root("tests::Missing#ROOT"),
            Err(ResolutionError::TypeNotFound {
                type_name: "tests::Missing".to_string()
            })
        );
    }

    #[test]
    fn test_resolve_root_field_not_found() {
        let registry = test_registry();
        assert!(matches!(
            registry.resolve_root("tests::NoopJob#OTHER"),
            Err(ResolutionError::FieldNotFound { .. })
        ));
    }

    #[test]
    fn test_resolve_root_not_a_namespace() {
        let registry = test_registry();
        assert!(matches!(
            registry.resolve_root("tests::NoopJob#VERSION"),
            Err(ResolutionError::NotANamespace { kind: "integer", .. })
        ));
    }

    #[test]
    fn test_schema_only_type_is_not_constructible() {
        let mut registry = test_registry();
        let scan = registry.schema().root().resolve_namespace("scan").unwrap();
        registry.register_type("tests::Schemas", [("SCAN", FieldValue::Namespace(scan))]);

        assert!(registry.resolve_root("tests::Schemas#SCAN").is_ok());
        assert_eq!(
            registry.check_constructible("tests::Schemas"),
            Err(ResolutionError::JobClassNotFound {
                class: "tests::Schemas".to_string()
            })
        );
        assert_eq!(registry.job_names().collect::<Vec<_>>(), vec!["tests::NoopJob"]);
    }

    #[test]
    fn test_instantiate() {
        let registry = test_registry();
        assert!(registry.check_constructible("tests::NoopJob").is_ok());
        let job = registry.instantiate("tests::NoopJob").unwrap();
        assert_eq!(job.name(), "tests::NoopJob");
        assert!(registry.instantiate("tests::Nope").is_err());
    }
}
