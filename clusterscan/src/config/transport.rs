//! Configuration subsetting and the flat transport carrier.
//!
//! [`subset`] extracts the options that live under a root namespace from a
//! populated [`Configuration`], checks each one against the set of
//! mutabilities allowed to cross the process boundary, and writes the
//! wire-encoded values into a [`TransportableConfiguration`].
//!
//! Any option outside the allowed set aborts the whole subset. Nothing is
//! returned on failure, so a caller can never hold a partially written
//! carrier.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::configuration::Configuration;
use super::error::ConfigError;
use super::schema::{ConfigNamespace, Mutability};

/// Errors from [`subset`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubsetError {
    /// A configured option may not leave this process.
    #[error("option '{path}' is {mutability} and may not be sent to a remote job")]
    NonTransportableOption { path: String, mutability: Mutability },

    /// A configured path could not be resolved or encoded against the root.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Flat, string-keyed, string-valued configuration carrier.
///
/// Keys are option paths relative to the root namespace the carrier was
/// built for. This is the only configuration representation that crosses
/// the submission boundary. Iteration order is the key order, so equal
/// carriers serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportableConfiguration {
    entries: BTreeMap<String, String>,
}

impl TransportableConfiguration {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Rebuilds a typed configuration rooted at `root`.
    pub fn decode(&self, root: &ConfigNamespace) -> Result<Configuration, ConfigError> {
        Configuration::from_flat(root.clone(), &self.entries)
    }
}

/// Extracts and encodes the options of `source` that live under `root`.
///
/// Each populated path under `root` is resolved against `root`'s schema and
/// must carry one of the `allowed` mutabilities.
pub fn subset(
    root: &ConfigNamespace,
    allowed: &[Mutability],
    source: &Configuration,
) -> Result<TransportableConfiguration, SubsetError> {
    let mut entries = BTreeMap::new();

    for (relative, value) in source.get_subset(root) {
        let option = root.resolve_option(&relative)?;
        if !allowed.contains(&option.mutability()) {
            return Err(SubsetError::NonTransportableOption {
                path: option.path(),
                mutability: option.mutability(),
            });
        }
        option.check(&value)?;
        entries.insert(relative, value.encode());
    }

    debug!(
        root = %root.path(),
        options = entries.len(),
        "Encoded transportable configuration"
    );

    Ok(TransportableConfiguration { entries })
}
