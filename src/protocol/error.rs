//! Error taxonomy shared by both tiers.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::payload::{FormatError, Mapping, Payload};

/// Enumerated failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Missing or invalid credentials.
    Auth,
    /// Too many failed authentication attempts from one client.
    Throttled,
    /// Malformed JSON or YAML.
    Format,
    /// Well-formed payload with the wrong shape for its route.
    Validation,
    /// Unknown route or missing record.
    NotFound,
    /// Persistence tier or its database could not be reached.
    BackendUnavailable,
    /// Unexpected fault.
    Internal,
}

impl ErrorKind {
    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorKind::Auth => StatusCode::UNAUTHORIZED,
            ErrorKind::Throttled => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::Format | ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::BackendUnavailable => StatusCode::BAD_GATEWAY,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Wire name, also used as a metrics and log label.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Auth => "auth",
            ErrorKind::Throttled => "throttled",
            ErrorKind::Format => "format",
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "notFound",
            ErrorKind::BackendUnavailable => "backendUnavailable",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client-safe error description. Carries no credentials, SQL or traces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorDetail {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn auth() -> Self {
        Self::new(ErrorKind::Auth, "missing or invalid credentials")
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn backend_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BackendUnavailable, message)
    }

    pub fn internal() -> Self {
        Self::new(ErrorKind::Internal, "internal error")
    }

    pub fn status_code(&self) -> StatusCode {
        self.kind.status_code()
    }

    pub fn to_payload(&self) -> Payload {
        let mut m = Mapping::new();
        m.insert("kind", self.kind.as_str());
        m.insert("message", self.message.as_str());
        Payload::Mapping(m)
    }
}

impl From<FormatError> for ErrorDetail {
    fn from(e: FormatError) -> Self {
        ErrorDetail::new(ErrorKind::Format, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ErrorKind::Validation.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorKind::BackendUnavailable.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(ErrorKind::Internal.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ErrorKind::Auth.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorKind::Format.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_wire_names_are_camel_case() {
        let json = serde_json::to_string(&ErrorKind::BackendUnavailable).unwrap();
        assert_eq!(json, "\"backendUnavailable\"");
        let kind: ErrorKind = serde_json::from_str("\"notFound\"").unwrap();
        assert_eq!(kind, ErrorKind::NotFound);
        assert_eq!(ErrorKind::NotFound.as_str(), "notFound");
    }
}
