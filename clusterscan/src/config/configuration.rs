//! Populated configuration instances.
//!
//! A [`Configuration`] is rooted at a namespace and maps option paths,
//! relative to that root, to typed values. Values are type-checked against
//! the schema when they are set.

use std::collections::BTreeMap;

use super::error::ConfigError;
use super::schema::{join_path, strip_path_prefix, ConfigNamespace, ConfigOption};
use super::value::ConfigValue;

/// An in-memory, populated instance of a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    root: ConfigNamespace,
    values: BTreeMap<String, ConfigValue>,
}

impl Configuration {
    /// Creates an empty configuration rooted at `root`.
    pub fn new(root: ConfigNamespace) -> Self {
        Self {
            root,
            values: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> &ConfigNamespace {
        &self.root
    }

    /// Sets an option, identified by its path relative to the root.
    ///
    /// Fails if the path does not name an option or the value does not match
    /// the option's declared type. On failure the configuration is unchanged.
    pub fn set(&mut self, path: &str, value: impl Into<ConfigValue>) -> Result<(), ConfigError> {
        let option = self.root.resolve_option(path)?;
        let value = value.into();
        option.check(&value)?;
        let key = self.key_for(&option);
        self.values.insert(key, value);
        Ok(())
    }

    /// Builder-style variant of [`set`](Self::set).
    pub fn with(mut self, path: &str, value: impl Into<ConfigValue>) -> Result<Self, ConfigError> {
        self.set(path, value)?;
        Ok(self)
    }

    /// Removes a configured value, returning it if it was set.
    pub fn unset(&mut self, path: &str) -> Result<Option<ConfigValue>, ConfigError> {
        let option = self.root.resolve_option(path)?;
        let key = self.key_for(&option);
        Ok(self.values.remove(&key))
    }

    /// Returns true if the option has an explicit value. Unknown paths are
    /// never set.
    pub fn is_set(&self, path: &str) -> bool {
        self.root
            .resolve_option(path)
            .map(|option| self.values.contains_key(&self.key_for(&option)))
            .unwrap_or(false)
    }

    /// Returns the configured value, falling back to the option's default.
    pub fn get(&self, path: &str) -> Result<Option<ConfigValue>, ConfigError> {
        let option = self.root.resolve_option(path)?;
        let key = self.key_for(&option);
        Ok(self
            .values
            .get(&key)
            .or(option.default_value())
            .cloned())
    }

    fn require(&self, path: &str) -> Result<ConfigValue, ConfigError> {
        self.get(path)?.ok_or_else(|| ConfigError::Missing {
            path: self.root.join(path),
        })
    }

    pub fn get_string(&self, path: &str) -> Result<String, ConfigError> {
        match self.require(path)? {
            ConfigValue::String(s) => Ok(s),
            other => Err(self.mismatch(path, &other)),
        }
    }

    pub fn get_integer(&self, path: &str) -> Result<i64, ConfigError> {
        match self.require(path)? {
            ConfigValue::Integer(i) => Ok(i),
            other => Err(self.mismatch(path, &other)),
        }
    }

    pub fn get_float(&self, path: &str) -> Result<f64, ConfigError> {
        match self.require(path)? {
            ConfigValue::Float(f) => Ok(f),
            other => Err(self.mismatch(path, &other)),
        }
    }

    pub fn get_bool(&self, path: &str) -> Result<bool, ConfigError> {
        match self.require(path)? {
            ConfigValue::Boolean(b) => Ok(b),
            other => Err(self.mismatch(path, &other)),
        }
    }

    pub fn get_string_list(&self, path: &str) -> Result<Vec<String>, ConfigError> {
        match self.require(path)? {
            ConfigValue::StringList(items) => Ok(items),
            other => Err(self.mismatch(path, &other)),
        }
    }

    /// Iterates over explicitly set values, keyed by path relative to the root.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the set values that live under `namespace`, keyed by path
    /// relative to `namespace`.
    ///
    /// Only explicitly set values are included; defaults are not. Options in
    /// sibling or unrelated namespaces never appear.
    pub fn get_subset(&self, namespace: &ConfigNamespace) -> BTreeMap<String, ConfigValue> {
        let root_path = self.root.path();
        let namespace_path = namespace.path();

        self.values
            .iter()
            .filter_map(|(key, value)| {
                let full = join_path(&root_path, key);
                strip_path_prefix(&full, &namespace_path)
                    .map(|relative| (relative.to_string(), value.clone()))
            })
            .collect()
    }

    /// Wire-encodes every set value.
    pub fn to_flat(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.encode()))
            .collect()
    }

    /// Rebuilds a configuration from wire-encoded values.
    ///
    /// Every key is resolved relative to `root` and decoded with the
    /// resolved option's declared type.
    pub fn from_flat<I, K, V>(root: ConfigNamespace, flat: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::new(root);
        for (key, raw) in flat {
            let option = config.root.resolve_option(key.as_ref())?;
            let value = option
                .value_type()
                .decode(raw.as_ref())
                .map_err(|reason| ConfigError::InvalidValue {
                    path: option.path(),
                    reason,
                })?;
            config.set(key.as_ref(), value)?;
        }
        Ok(config)
    }

    fn key_for(&self, option: &ConfigOption) -> String {
        let full = option.path();
        strip_path_prefix(&full, &self.root.path())
            .unwrap_or(&full)
            .to_string()
    }

    fn mismatch(&self, path: &str, found: &ConfigValue) -> ConfigError {
        match self.root.resolve_option(path) {
            Ok(option) => ConfigError::TypeMismatch {
                path: option.path(),
                expected: option.value_type(),
                found: found.value_type(),
            },
            Err(e) => e,
        }
    }
}
