//! JSON ⇄ YAML normalization.

use std::fmt;

use crate::payload::value::Payload;

/// Supported payload encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    #[default]
    Json,
    Yaml,
}

impl Format {
    /// Pick a format from a `Content-Type` header value.
    ///
    /// Media type parameters are ignored. Absent or unrecognised types fall
    /// back to JSON.
    pub fn from_content_type(content_type: Option<&str>) -> Format {
        let Some(raw) = content_type else {
            return Format::Json;
        };
        let essence = raw
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "application/x-yaml" | "application/yaml" | "text/yaml" | "text/x-yaml" => {
                Format::Yaml
            }
            _ => Format::Json,
        }
    }

    /// Canonical `Content-Type` for responses.
    pub fn content_type(self) -> &'static str {
        match self {
            Format::Json => "application/json",
            Format::Yaml => "application/x-yaml",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "yaml" | "yml" => Ok(Format::Yaml),
            other => Err(format!("unsupported format: {}", other)),
        }
    }
}

/// Malformed or unrepresentable payload.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("empty {0} document")]
    Empty(Format),

    #[error("malformed json payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed yaml payload: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Parse raw bytes in the declared format.
///
/// Errors are always propagated; malformed input never becomes an empty mapping.
pub fn parse(raw: &[u8], format: Format) -> Result<Payload, FormatError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Err(FormatError::Empty(format));
    }
    match format {
        Format::Json => Ok(serde_json::from_slice(raw)?),
        Format::Yaml => Ok(serde_yaml::from_slice(raw)?),
    }
}

/// Serialize a payload into the target format.
pub fn serialize(payload: &Payload, format: Format) -> Result<Vec<u8>, FormatError> {
    match format {
        Format::Json => Ok(serde_json::to_vec(payload)?),
        Format::Yaml => Ok(serde_yaml::to_string(payload)?.into_bytes()),
    }
}
