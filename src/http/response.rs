//! Response rendering.
//!
//! Payloads go back in the format the client declared. Error bodies are
//! `{kind, message}` in that same format, with the auth challenge or
//! `Retry-After` header where the kind calls for one.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use std::time::Duration;

use crate::payload::{serialize, Format, Payload};
use crate::protocol::{ErrorDetail, ErrorKind};

/// Challenge sent with every 401.
pub const BASIC_CHALLENGE: &str = "Basic realm=\"pacmaster\"";

pub fn payload_response(status: StatusCode, payload: &Payload, format: Format) -> Response {
    match serialize(payload, format) {
        Ok(bytes) => (
            status,
            [(header::CONTENT_TYPE, format.content_type())],
            bytes,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, format = %format, "Failed to serialize response payload");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
        }
    }
}

pub fn error_response(error: &ErrorDetail, format: Format) -> Response {
    let mut response = payload_response(error.status_code(), &error.to_payload(), format);
    if error.kind == ErrorKind::Auth {
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static(BASIC_CHALLENGE),
        );
    }
    response
}

/// Attach `Retry-After`, rounded up to whole seconds.
pub fn with_retry_after(mut response: Response, wait: Duration) -> Response {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
    response
}
