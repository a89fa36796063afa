//! Configuration-root references.
//!
//! A root reference names the place where a job's configuration schema is
//! declared: `<type-name>#<field-name>`. The type name is a registered type
//! (usually the job implementation itself) and the field name is one of the
//! schema fields that type exposes through
//! [`SchemaProvider`](super::SchemaProvider).

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Separator between the type name and the field name.
pub const REFERENCE_SEPARATOR: char = '#';

/// A root reference string does not have the `<type>#<field>` shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed root reference '{reference}': {reason}")]
pub struct MalformedReference {
    pub reference: String,
    pub reason: &'static str,
}

/// A parsed `<type-name>#<field-name>` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RootReference {
    type_name: String,
    field_name: String,
}

impl RootReference {
    /// Creates a reference from its parts.
    ///
    /// Both parts must be non-empty and free of the separator, so that the
    /// encoded form always decodes back to the same pair.
    pub fn new(
        type_name: impl Into<String>,
        field_name: impl Into<String>,
    ) -> Result<Self, MalformedReference> {
        let type_name = type_name.into();
        let field_name = field_name.into();
        let encoded = encode_reference(&type_name, &field_name);
        decode_reference(&encoded)?;
        Ok(Self {
            type_name,
            field_name,
        })
    }

    /// Parses an encoded reference.
    pub fn parse(reference: &str) -> Result<Self, MalformedReference> {
        let (type_name, field_name) = decode_reference(reference)?;
        Ok(Self {
            type_name,
            field_name,
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }
}

impl fmt::Display for RootReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.type_name, REFERENCE_SEPARATOR, self.field_name
        )
    }
}

impl FromStr for RootReference {
    type Err = MalformedReference;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Encodes a type name and field name as `<type>#<field>`.
pub fn encode_reference(type_name: &str, field_name: &str) -> String {
    format!("{}{}{}", type_name, REFERENCE_SEPARATOR, field_name)
}

/// Splits a `<type>#<field>` reference into its parts.
///
/// Fails when the separator is missing or appears more than once, or when
/// either side of it is empty.
pub fn decode_reference(reference: &str) -> Result<(String, String), MalformedReference> {
    let malformed = |reason| MalformedReference {
        reference: reference.to_string(),
        reason,
    };

    let mut parts = reference.split(REFERENCE_SEPARATOR);
    let (type_name, field_name) = match (parts.next(), parts.next(), parts.next()) {
        (Some(t), Some(f), None) => (t, f),
        (_, None, _) => return Err(malformed("missing '#' separator")),
        _ => return Err(malformed("more than one '#' separator")),
    };

    if type_name.is_empty() {
        return Err(malformed("empty type name"));
    }
    if field_name.is_empty() {
        return Err(malformed("empty field name"));
    }

    Ok((type_name.to_string(), field_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_reference() {
        assert_eq!(
            encode_reference("clusterscan::jobs::RecordCountJob", "SCAN_ROOT"),
            "clusterscan::jobs::RecordCountJob#SCAN_ROOT"
        );
    }

    #[test]
    fn test_reference_round_trip() {
        let cases = [
            ("a", "b"),
            ("com.example.MyJob", "ROOT"),
            ("clusterscan::jobs::RecordCountJob", "SCAN_ROOT"),
            ("with space", "field.with.dots"),
        ];
        for (t, f) in cases {
            let decoded = decode_reference(&encode_reference(t, f)).unwrap();
            assert_eq!(decoded, (t.to_string(), f.to_string()));
        }
    }

    #[test]
    fn test_missing_separator() {
        let err = decode_reference("com.example.MyJob").unwrap_err();
        assert_eq!(err.reference, "com.example.MyJob");
        assert_eq!(err.reason, "missing '#' separator");
    }

    #[test]
    fn test_duplicated_separator() {
        let err = decode_reference("a#b#c").unwrap_err();
        assert_eq!(err.reason, "more than one '#' separator");
    }

    #[test]
    fn test_empty_sides_rejected() {
        assert!(decode_reference("#field").is_err());
        assert!(decode_reference("Type#").is_err());
        assert!(decode_reference("#").is_err());
        assert!(decode_reference("").is_err());
    }

    #[test]
    fn test_root_reference_parse_and_display() {
        let reference: RootReference = "my::Job#ROOT".parse().unwrap();
        assert_eq!(reference.type_name(), "my::Job");
        assert_eq!(reference.field_name(), "ROOT");
        assert_eq!(reference.to_string(), "my::Job#ROOT");
    }

    #[test]
    fn test_root_reference_new_rejects_separator_in_parts() {
        assert!(RootReference::new("my::Job", "RO#OT").is_err());
        assert!(RootReference::new("my::Job", "ROOT").is_ok());
    }
}
