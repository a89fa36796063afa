//! Declared value types and their string encodings.
//!
//! Two encodings exist for every type:
//!
//! - The **wire encoding** ([`ConfigValue::encode`] / [`ValueType::decode`]) is
//!   what crosses the submission boundary. It is lossless: decoding an encoded
//!   value against the same type reproduces the value exactly.
//! - The **human encoding** ([`ValueType::parse_human`]) is what users write in
//!   configuration files. It is lenient (booleans accept `yes`/`on`/`1`, lists
//!   are comma separated) and is never used for transport.
//!
//! String lists are wire-encoded as a concatenation of `<byte-len>:<bytes>`
//! frames, so element contents never need escaping.

use std::fmt;

/// Declared type of a configuration option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    String,
    Integer,
    Float,
    Boolean,
    StringList,
}

impl ValueType {
    /// Returns the lowercase type name used in messages and listings.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Integer => "integer",
            ValueType::Float => "float",
            ValueType::Boolean => "boolean",
            ValueType::StringList => "string-list",
        }
    }

    /// Checks that `value` is acceptable for this type.
    ///
    /// Returns the reason on failure. Non-finite floats are rejected so that
    /// every accepted value survives an encode/decode round trip.
    pub fn check(&self, value: &ConfigValue) -> Result<(), String> {
        if value.value_type() != *self {
            return Err(format!(
                "expected {}, found {}",
                self.as_str(),
                value.value_type().as_str()
            ));
        }
        if let ConfigValue::Float(f) = value {
            if !f.is_finite() {
                return Err("float values must be finite".to_string());
            }
        }
        Ok(())
    }

    /// Decodes a wire-encoded value.
    pub fn decode(&self, raw: &str) -> Result<ConfigValue, String> {
        match self {
            ValueType::String => Ok(ConfigValue::String(raw.to_string())),
            ValueType::Integer => raw
                .parse::<i64>()
                .map(ConfigValue::Integer)
                .map_err(|_| format!("'{}' is not an integer", raw)),
            ValueType::Float => {
                let f = raw
                    .parse::<f64>()
                    .map_err(|_| format!("'{}' is not a number", raw))?;
                if f.is_finite() {
                    Ok(ConfigValue::Float(f))
                } else {
                    Err("float values must be finite".to_string())
                }
            }
            ValueType::Boolean => match raw {
                "true" => Ok(ConfigValue::Boolean(true)),
                "false" => Ok(ConfigValue::Boolean(false)),
                _ => Err(format!("'{}' is not 'true' or 'false'", raw)),
            },
            ValueType::StringList => decode_list(raw).map(ConfigValue::StringList),
        }
    }

    /// Parses a value as written by a person in a configuration file.
    pub fn parse_human(&self, raw: &str) -> Result<ConfigValue, String> {
        let trimmed = raw.trim();
        match self {
            ValueType::String => Ok(ConfigValue::String(trimmed.to_string())),
            ValueType::Integer | ValueType::Float => self.decode(trimmed),
            ValueType::Boolean => match trimmed.to_lowercase().as_str() {
                "true" | "yes" | "1" | "on" => Ok(ConfigValue::Boolean(true)),
                "false" | "no" | "0" | "off" => Ok(ConfigValue::Boolean(false)),
                _ => Err("must be true/false, yes/no, 1/0, or on/off".to_string()),
            },
            ValueType::StringList => {
                if trimmed.is_empty() {
                    return Ok(ConfigValue::StringList(Vec::new()));
                }
                Ok(ConfigValue::StringList(
                    trimmed.split(',').map(|s| s.trim().to_string()).collect(),
                ))
            }
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    StringList(Vec<String>),
}

impl ConfigValue {
    /// Returns the type of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            ConfigValue::String(_) => ValueType::String,
            ConfigValue::Integer(_) => ValueType::Integer,
            ConfigValue::Float(_) => ValueType::Float,
            ConfigValue::Boolean(_) => ValueType::Boolean,
            ConfigValue::StringList(_) => ValueType::StringList,
        }
    }

    /// Encodes this value for transport.
    pub fn encode(&self) -> String {
        match self {
            ConfigValue::String(s) => s.clone(),
            ConfigValue::Integer(i) => i.to_string(),
            // Display for f64 is the shortest representation that parses back
            // to the same value.
            ConfigValue::Float(f) => f.to_string(),
            ConfigValue::Boolean(b) => b.to_string(),
            ConfigValue::StringList(items) => encode_list(items),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ConfigValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            ConfigValue::StringList(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::StringList(items) => write!(f, "{}", items.join(", ")),
            other => f.write_str(&other.encode()),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::String(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::String(s)
    }
}

impl From<i64> for ConfigValue {
    fn from(i: i64) -> Self {
        ConfigValue::Integer(i)
    }
}

impl From<i32> for ConfigValue {
    fn from(i: i32) -> Self {
        ConfigValue::Integer(i64::from(i))
    }
}

impl From<f64> for ConfigValue {
    fn from(f: f64) -> Self {
        ConfigValue::Float(f)
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Boolean(b)
    }
}

impl From<Vec<String>> for ConfigValue {
    fn from(items: Vec<String>) -> Self {
        ConfigValue::StringList(items)
    }
}

// ============================================================================
// List framing
// ============================================================================

fn encode_list(items: &[String]) -> String {
    let mut out = String::new();
    for item in items {
        out.push_str(&item.len().to_string());
        out.push(':');
        out.push_str(item);
    }
    out
}

fn decode_list(raw: &str) -> Result<Vec<String>, String> {
    let mut items = Vec::new();
    let mut rest = raw;

    while !rest.is_empty() {
        let (len, tail) = rest
            .split_once(':')
            .ok_or_else(|| "list frame is missing its length prefix".to_string())?;
        let len: usize = len
            .parse()
            .map_err(|_| format!("invalid list frame length '{}'", len))?;
        if len > tail.len() || !tail.is_char_boundary(len) {
            return Err(format!("list frame of length {} overruns the input", len));
        }
        items.push(tail[..len].to_string());
        rest = &tail[len..];
    }

    Ok(items)
}
