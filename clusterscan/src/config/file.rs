//! Loading configurations from INI files.
//!
//! Section names are dotted namespace paths relative to the configuration
//! root; keys are option names (or dotted paths) relative to the section.
//! Keys outside any section resolve directly against the root:
//!
//! ```ini
//! [scan]
//! batchSize = 500
//!
//! [scan.count]
//! key-prefix = user:
//! columns = name, email
//! ```
//!
//! Values use the human encoding from [`ValueType::parse_human`]. Every key
//! must resolve to a declared option; unknown keys are rejected rather than
//! ignored so that typos surface before a job is submitted.
//!
//! [`ValueType::parse_human`]: super::value::ValueType::parse_human

use ini::Ini;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use super::configuration::Configuration;
use super::error::ConfigError;
use super::schema::{join_path, ConfigNamespace};

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read or parse the file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Key does not name a declared option
    #[error("Unknown configuration key: [{section}] {key}")]
    UnknownKey { section: String, key: String },

    /// Invalid configuration value
    #[error("Invalid configuration: [{section}] {key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// Loads a configuration rooted at `root` from an INI file.
///
/// A missing file yields an empty configuration.
pub fn load_configuration(
    path: &Path,
    root: ConfigNamespace,
) -> Result<Configuration, ConfigFileError> {
    if !path.exists() {
        debug!(path = %path.display(), "Config file not found, using empty configuration");
        return Ok(Configuration::new(root));
    }

    let ini = Ini::load_from_file(path)?;
    parse_ini(&ini, root)
}

/// Loads a configuration rooted at `root` from INI text.
pub fn parse_configuration(
    content: &str,
    root: ConfigNamespace,
) -> Result<Configuration, ConfigFileError> {
    let ini = Ini::load_from_str(content)
        .map_err(|e| ConfigFileError::ReadError(ini::Error::Parse(e)))?;
    parse_ini(&ini, root)
}

fn parse_ini(ini: &Ini, root: ConfigNamespace) -> Result<Configuration, ConfigFileError> {
    let mut config = Configuration::new(root);

    for (section, properties) in ini.iter() {
        let section = section.unwrap_or("");
        for (key, raw) in properties.iter() {
            let path = join_path(section, key);
            let option = config.root().resolve_option(&path).map_err(|e| match e {
                ConfigError::UnknownPath { .. } | ConfigError::NotAnOption { .. } => {
                    ConfigFileError::UnknownKey {
                        section: section.to_string(),
                        key: key.to_string(),
                    }
                }
                other => invalid(section, key, raw, other.to_string()),
            })?;

            let value = option
                .value_type()
                .parse_human(raw)
                .map_err(|reason| invalid(section, key, raw, reason))?;

            config
                .set(&path, value)
                .map_err(|e| invalid(section, key, raw, e.to_string()))?;
        }
    }

    debug!(options = config.len(), "Parsed configuration file");
    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: String) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason,
    }
}
