//! Request inspection helpers shared by both tiers.
//!
//! # Responsibilities
//! - Read the request ID stamped by `SetRequestIdLayer`
//! - Derive the declared payload format from `Content-Type`
//! - Extract Basic credentials and the peer address
//!
//! # Design Decisions
//! - Helpers take headers/extensions, not whole requests, so the dispatcher
//!   stays independent of axum types
//! - A missing peer address is not an error (router tests run without one)

use axum::extract::ConnectInfo;
use axum::http::{header, Extensions, HeaderMap};
use std::net::{IpAddr, SocketAddr};

use crate::payload::Format;
use crate::security::Credential;

/// Correlation header carried from client to gateway to adapter.
pub const X_REQUEST_ID: &str = "x-request-id";

pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

pub fn declared_format(headers: &HeaderMap) -> Format {
    Format::from_content_type(headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()))
}

pub fn credentials(headers: &HeaderMap) -> Option<Credential> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(Credential::from_basic_header)
}

pub fn client_ip(extensions: &Extensions) -> Option<IpAddr> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_header_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("abc-123"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/x-yaml"));
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&Credential::new("alice", "secret").to_basic_header()).unwrap(),
        );

        assert_eq!(request_id(&headers), "abc-123");
        assert_eq!(declared_format(&headers), Format::Yaml);
        assert_eq!(credentials(&headers), Some(Credential::new("alice", "secret")));
    }

    #[test]
    fn test_missing_headers() {
        let headers = HeaderMap::new();
        assert_eq!(request_id(&headers), "unknown");
        assert_eq!(declared_format(&headers), Format::Json);
        assert_eq!(credentials(&headers), None);
        assert_eq!(client_ip(&Extensions::new()), None);
    }

    #[test]
    fn test_client_ip_from_connect_info() {
        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo("10.1.2.3:4000".parse::<SocketAddr>().unwrap()));
        assert_eq!(client_ip(&extensions), Some("10.1.2.3".parse().unwrap()));
    }
}
