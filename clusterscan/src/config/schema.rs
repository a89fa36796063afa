//! Hierarchical configuration schema.
//!
//! A schema is a tree of namespaces and options. It is declared once at
//! process start through a [`SchemaBuilder`] and frozen by
//! [`SchemaBuilder::build`], which hands back an `Arc<ConfigSchema>`. The
//! frozen tree has no mutation API, so it can be shared by every concurrent
//! submission without locking.
//!
//! Elements live in a flat arena. Children are owned by the arena and
//! referenced from their parent by index; each element keeps its parent's
//! index only to compute paths.
//!
//! Paths are dotted and exclude the root's own name: an option `batchSize`
//! declared in namespace `scan` directly under the root has path
//! `scan.batchSize`.
//!
//! # Example
//!
//! ```
//! use clusterscan::config::{Mutability, OptionSpec, SchemaBuilder, ValueType};
//!
//! let mut builder = SchemaBuilder::new("root");
//! let scan = builder.namespace(builder.root(), "scan", "Scan settings").unwrap();
//! builder
//!     .option(
//!         scan,
//!         OptionSpec::new("batchSize", ValueType::Integer, Mutability::Transportable)
//!             .with_default(100),
//!     )
//!     .unwrap();
//! let schema = builder.build();
//!
//! let option = schema.root().resolve_option("scan.batchSize").unwrap();
//! assert_eq!(option.path(), "scan.batchSize");
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::error::{ConfigError, SchemaError};
use super::value::{ConfigValue, ValueType};

/// Separator between path components.
pub const PATH_SEPARATOR: char = '.';

/// Separator between a root and a path in the combined `<root>#<path>` form.
pub const ROOT_SEPARATOR: char = '#';

/// Whether, and how, an option may leave the submitting process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mutability {
    /// Meaningful only in the submitting process.
    Local,
    /// May be serialized into a remote job's environment.
    Transportable,
    /// Never serialized anywhere (credentials and other secrets).
    Masked,
}

impl Mutability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mutability::Local => "local",
            Mutability::Transportable => "transportable",
            Mutability::Masked => "masked",
        }
    }
}

impl fmt::Display for Mutability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index of a namespace inside a [`SchemaBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamespaceId(usize);

/// Declaration of a single option.
#[derive(Debug, Clone)]
pub struct OptionSpec {
    name: String,
    value_type: ValueType,
    mutability: Mutability,
    default: Option<ConfigValue>,
    description: String,
}

impl OptionSpec {
    pub fn new(name: impl Into<String>, value_type: ValueType, mutability: Mutability) -> Self {
        Self {
            name: name.into(),
            value_type,
            mutability,
            default: None,
            description: String::new(),
        }
    }

    /// Sets the value used when a configuration does not set the option.
    pub fn with_default(mut self, default: impl Into<ConfigValue>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

// ============================================================================
// Arena
// ============================================================================

#[derive(Debug)]
enum Element {
    Namespace(NamespaceNode),
    Option(OptionNode),
}

#[derive(Debug)]
struct NamespaceNode {
    name: String,
    parent: Option<usize>,
    description: String,
    children: BTreeMap<String, usize>,
}

#[derive(Debug)]
struct OptionNode {
    name: String,
    parent: usize,
    value_type: ValueType,
    mutability: Mutability,
    default: Option<ConfigValue>,
    description: String,
}

const ROOT_INDEX: usize = 0;

/// Builder for a [`ConfigSchema`].
#[derive(Debug)]
pub struct SchemaBuilder {
    elements: Vec<Element>,
}

impl SchemaBuilder {
    /// Creates a builder whose root namespace has the given name.
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            elements: vec![Element::Namespace(NamespaceNode {
                name: root_name.into(),
                parent: None,
                description: String::new(),
                children: BTreeMap::new(),
            })],
        }
    }

    /// Returns the root namespace.
    pub fn root(&self) -> NamespaceId {
        NamespaceId(ROOT_INDEX)
    }

    /// Declares a child namespace under `parent`.
    pub fn namespace(
        &mut self,
        parent: NamespaceId,
        name: &str,
        description: &str,
    ) -> Result<NamespaceId, SchemaError> {
        self.check_child_name(parent, name)?;
        let index = self.elements.len();
        self.elements.push(Element::Namespace(NamespaceNode {
            name: name.to_string(),
            parent: Some(parent.0),
            description: description.to_string(),
            children: BTreeMap::new(),
        }));
        self.attach(parent, name, index);
        Ok(NamespaceId(index))
    }

    /// Declares an option under `parent`.
    pub fn option(&mut self, parent: NamespaceId, spec: OptionSpec) -> Result<(), SchemaError> {
        self.check_child_name(parent, &spec.name)?;
        if let Some(default) = &spec.default {
            spec.value_type
                .check(default)
                .map_err(|reason| SchemaError::DefaultTypeMismatch {
                    name: spec.name.clone(),
                    reason,
                })?;
        }
        let index = self.elements.len();
        let name = spec.name.clone();
        self.elements.push(Element::Option(OptionNode {
            name: spec.name,
            parent: parent.0,
            value_type: spec.value_type,
            mutability: spec.mutability,
            default: spec.default,
            description: spec.description,
        }));
        self.attach(parent, &name, index);
        Ok(())
    }

    /// Freezes the tree.
    pub fn build(self) -> Arc<ConfigSchema> {
        Arc::new(ConfigSchema {
            elements: self.elements,
        })
    }

    fn check_child_name(&self, parent: NamespaceId, name: &str) -> Result<(), SchemaError> {
        validate_name(name)?;
        match self.elements.get(parent.0) {
            Some(Element::Namespace(node)) => {
                if node.children.contains_key(name) {
                    return Err(SchemaError::DuplicateName {
                        parent: path_of(&self.elements, parent.0),
                        name: name.to_string(),
                    });
                }
                Ok(())
            }
            _ => Err(SchemaError::UnknownNamespace(parent.0)),
        }
    }

    fn attach(&mut self, parent: NamespaceId, name: &str, child: usize) {
        if let Some(Element::Namespace(node)) = self.elements.get_mut(parent.0) {
            node.children.insert(name.to_string(), child);
        }
    }
}

fn validate_name(name: &str) -> Result<(), SchemaError> {
    let reason = if name.is_empty() {
        Some("must not be empty")
    } else if name.contains(PATH_SEPARATOR) || name.contains(ROOT_SEPARATOR) {
        Some("must not contain '.' or '#'")
    } else if name.chars().any(char::is_whitespace) {
        Some("must not contain whitespace")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(SchemaError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

fn name_of(elements: &[Element], index: usize) -> &str {
    match &elements[index] {
        Element::Namespace(node) => &node.name,
        Element::Option(node) => &node.name,
    }
}

fn parent_of(elements: &[Element], index: usize) -> Option<usize> {
    match &elements[index] {
        Element::Namespace(node) => node.parent,
        Element::Option(node) => Some(node.parent),
    }
}

/// Dotted path of an element, excluding the root's name.
fn path_of(elements: &[Element], index: usize) -> String {
    let mut components = Vec::new();
    let mut current = Some(index);
    while let Some(i) = current {
        let parent = parent_of(elements, i);
        if parent.is_some() {
            components.push(name_of(elements, i));
        }
        current = parent;
    }
    components.reverse();
    components.join(".")
}

// ============================================================================
// Frozen schema and element handles
// ============================================================================

/// A frozen configuration schema.
#[derive(Debug)]
pub struct ConfigSchema {
    elements: Vec<Element>,
}

impl ConfigSchema {
    /// Returns the root namespace.
    pub fn root(self: &Arc<Self>) -> ConfigNamespace {
        ConfigNamespace {
            schema: Arc::clone(self),
            index: ROOT_INDEX,
        }
    }

    /// Returns every option in the schema, in path order.
    pub fn options(self: &Arc<Self>) -> Vec<ConfigOption> {
        self.root().options()
    }
}

/// A resolved schema element.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigElement {
    Namespace(ConfigNamespace),
    Option(ConfigOption),
}

impl ConfigElement {
    fn new(schema: &Arc<ConfigSchema>, index: usize) -> Self {
        let is_namespace = matches!(schema.elements[index], Element::Namespace(_));
        let schema = Arc::clone(schema);
        if is_namespace {
            ConfigElement::Namespace(ConfigNamespace { schema, index })
        } else {
            ConfigElement::Option(ConfigOption { schema, index })
        }
    }

    pub fn path(&self) -> String {
        match self {
            ConfigElement::Namespace(ns) => ns.path(),
            ConfigElement::Option(option) => option.path(),
        }
    }
}

/// Handle to a namespace in a frozen schema.
#[derive(Clone)]
pub struct ConfigNamespace {
    schema: Arc<ConfigSchema>,
    index: usize,
}

impl ConfigNamespace {
    fn node(&self) -> &NamespaceNode {
        match &self.schema.elements[self.index] {
            Element::Namespace(node) => node,
            Element::Option(_) => unreachable!("namespace handle points at an option"),
        }
    }

    pub fn name(&self) -> &str {
        &self.node().name
    }

    pub fn description(&self) -> &str {
        &self.node().description
    }

    /// Dotted path from the schema root; empty for the root itself.
    pub fn path(&self) -> String {
        path_of(&self.schema.elements, self.index)
    }

    pub fn is_root(&self) -> bool {
        self.node().parent.is_none()
    }

    pub fn parent(&self) -> Option<ConfigNamespace> {
        self.node().parent.map(|index| ConfigNamespace {
            schema: Arc::clone(&self.schema),
            index,
        })
    }

    pub fn schema(&self) -> &Arc<ConfigSchema> {
        &self.schema
    }

    /// Looks up a direct child by name.
    pub fn child(&self, name: &str) -> Option<ConfigElement> {
        self.node()
            .children
            .get(name)
            .map(|&index| ConfigElement::new(&self.schema, index))
    }

    /// Resolves a dotted path relative to this namespace.
    ///
    /// Also accepts the combined form `<root>#<path>`, where `<root>` names
    /// this namespace either by its own name or by its full path. The empty
    /// path resolves to this namespace.
    pub fn resolve(&self, path: &str) -> Result<ConfigElement, ConfigError> {
        let relative = match path.split_once(ROOT_SEPARATOR) {
            Some((root, rest)) => {
                if rest.contains(ROOT_SEPARATOR) || (root != self.name() && root != self.path()) {
                    return Err(ConfigError::UnknownPath {
                        path: path.to_string(),
                    });
                }
                rest
            }
            None => path,
        };

        if relative.is_empty() {
            return Ok(ConfigElement::Namespace(self.clone()));
        }

        let mut current = self.index;
        for component in relative.split(PATH_SEPARATOR) {
            let next = match &self.schema.elements[current] {
                Element::Namespace(node) => node.children.get(component).copied(),
                Element::Option(_) => None,
            };
            current = next.ok_or_else(|| ConfigError::UnknownPath {
                path: self.join(relative),
            })?;
        }

        Ok(ConfigElement::new(&self.schema, current))
    }

    /// Resolves a path that must name an option.
    pub fn resolve_option(&self, path: &str) -> Result<ConfigOption, ConfigError> {
        match self.resolve(path)? {
            ConfigElement::Option(option) => Ok(option),
            ConfigElement::Namespace(ns) => Err(ConfigError::NotAnOption { path: ns.path() }),
        }
    }

    /// Resolves a path that must name a namespace.
    pub fn resolve_namespace(&self, path: &str) -> Result<ConfigNamespace, ConfigError> {
        match self.resolve(path)? {
            ConfigElement::Namespace(ns) => Ok(ns),
            ConfigElement::Option(option) => Err(ConfigError::NotANamespace {
                path: option.path(),
            }),
        }
    }

    /// All options at or below this namespace, in path order.
    pub fn options(&self) -> Vec<ConfigOption> {
        let mut out = Vec::new();
        self.collect_options(&mut out);
        out
    }

    fn collect_options(&self, out: &mut Vec<ConfigOption>) {
        for &index in self.node().children.values() {
            match ConfigElement::new(&self.schema, index) {
                ConfigElement::Option(option) => out.push(option),
                ConfigElement::Namespace(ns) => ns.collect_options(out),
            }
        }
    }

    /// Full path of `relative` under this namespace.
    pub fn join(&self, relative: &str) -> String {
        join_path(&self.path(), relative)
    }
}

impl PartialEq for ConfigNamespace {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.schema, &other.schema) && self.index == other.index
    }
}

impl fmt::Debug for ConfigNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigNamespace({})", self.path())
    }
}

/// Handle to an option in a frozen schema.
#[derive(Clone)]
pub struct ConfigOption {
    schema: Arc<ConfigSchema>,
    index: usize,
}

impl ConfigOption {
    fn node(&self) -> &OptionNode {
        match &self.schema.elements[self.index] {
            Element::Option(node) => node,
            Element::Namespace(_) => unreachable!("option handle points at a namespace"),
        }
    }

    pub fn name(&self) -> &str {
        &self.node().name
    }

    pub fn path(&self) -> String {
        path_of(&self.schema.elements, self.index)
    }

    pub fn value_type(&self) -> ValueType {
        self.node().value_type
    }

    pub fn mutability(&self) -> Mutability {
        self.node().mutability
    }

    pub fn default_value(&self) -> Option<&ConfigValue> {
        self.node().default.as_ref()
    }

    pub fn description(&self) -> &str {
        &self.node().description
    }

    pub fn namespace(&self) -> ConfigNamespace {
        ConfigNamespace {
            schema: Arc::clone(&self.schema),
            index: self.node().parent,
        }
    }

    /// Type-checks `value` against this option's declared type.
    pub fn check(&self, value: &ConfigValue) -> Result<(), ConfigError> {
        self.value_type().check(value).map_err(|_| {
            if value.value_type() == self.value_type() {
                ConfigError::InvalidValue {
                    path: self.path(),
                    reason: "float values must be finite".to_string(),
                }
            } else {
                ConfigError::TypeMismatch {
                    path: self.path(),
                    expected: self.value_type(),
                    found: value.value_type(),
                }
            }
        })
    }
}

impl PartialEq for ConfigOption {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.schema, &other.schema) && self.index == other.index
    }
}

impl fmt::Debug for ConfigOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConfigOption({}: {}, {})",
            self.path(),
            self.value_type(),
            self.mutability()
        )
    }
}

/// Joins two dotted paths, either of which may be empty.
pub fn join_path(prefix: &str, relative: &str) -> String {
    match (prefix.is_empty(), relative.is_empty()) {
        (true, _) => relative.to_string(),
        (_, true) => prefix.to_string(),
        _ => format!("{}{}{}", prefix, PATH_SEPARATOR, relative),
    }
}

/// Strips `prefix` from a dotted `path`, returning the remainder.
///
/// Matches whole components only: `scan` is a prefix of `scan.batchSize`
/// but not of `scanner.batchSize`.
pub fn strip_path_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(path);
    }
    path.strip_prefix(prefix)?.strip_prefix(PATH_SEPARATOR)
}
