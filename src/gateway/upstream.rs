//! Gateway → persistence adapter transport.
//!
//! # Responsibilities
//! - Send one wire request to `POST /v1/execute` over a pooled connection
//! - Bound every attempt with a deadline
//! - Classify failures as transient (retry once) or terminal
//! - Never repeat a write the adapter may already have run
//!
//! # Design Decisions
//! - The wire is always JSON, whatever format the client used
//! - The adapter's HTTP status is informational; the body is authoritative

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::time::Duration;

use crate::config::UpstreamConfig;
use crate::http::X_REQUEST_ID;
use crate::payload::Format;
use crate::protocol::{AdapterRequest, AdapterResult, EXECUTE_PATH};
use crate::resilience::with_deadline;
use crate::routing::Route;

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// The connection could not be established. Nothing reached the adapter.
    #[error("connection to persistence service failed: {0}")]
    Connect(String),

    /// The request was sent but the exchange broke before response headers.
    #[error("connection to persistence service interrupted: {0}")]
    Interrupted(String),

    #[error("persistence service did not answer within {0:?}")]
    Timeout(Duration),

    /// The adapter answered with something that is not an `AdapterResult`,
    /// including a body that is unreadable or over the size cap.
    #[error("invalid response from persistence service: {0}")]
    InvalidResponse(String),

    /// The outbound request could not be built.
    #[error("failed to encode request: {0}")]
    Encode(String),
}

impl UpstreamError {
    /// Network-level failures that may succeed on a second attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            UpstreamError::Connect(_) | UpstreamError::Timeout(_) | UpstreamError::Interrupted(_)
        )
    }

    /// Whether a second attempt of `route` is safe after this failure.
    ///
    /// A refused connection never reached the adapter. A timeout or broken
    /// exchange may have, so only read-only routes are repeated.
    pub fn is_retryable_for(&self, route: Route) -> bool {
        match self {
            UpstreamError::Connect(_) => true,
            UpstreamError::Timeout(_) | UpstreamError::Interrupted(_) => route.is_read_only(),
            UpstreamError::InvalidResponse(_) | UpstreamError::Encode(_) => false,
        }
    }
}

/// Something that can execute an adapter request.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn execute(
        &self,
        request: &AdapterRequest,
        request_id: &str,
    ) -> Result<AdapterResult, UpstreamError>;
}

/// Production upstream: hyper pooled HTTP/1.1 client.
pub struct HttpUpstream {
    client: Client<HttpConnector, Body>,
    uri: Uri,
    timeout: Duration,
    max_response_bytes: usize,
}

impl HttpUpstream {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let uri: Uri = format!("http://{}{}", config.address, EXECUTE_PATH)
            .parse()
            .map_err(|e: axum::http::uri::InvalidUri| UpstreamError::Encode(e.to_string()))?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_millis(config.timeout_ms)));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
            .build(connector);

        Ok(Self {
            client,
            uri,
            timeout: Duration::from_millis(config.timeout_ms),
            max_response_bytes: config.max_response_bytes,
        })
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    async fn send(&self, body: Vec<u8>, request_id: &str) -> Result<AdapterResult, UpstreamError> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(self.uri.clone())
            .header(header::CONTENT_TYPE, Format::Json.content_type())
            .header(X_REQUEST_ID, request_id)
            .body(Body::from(body))
            .map_err(|e| UpstreamError::Encode(e.to_string()))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| {
                if e.is_connect() {
                    UpstreamError::Connect(e.to_string())
                } else {
                    UpstreamError::Interrupted(e.to_string())
                }
            })?;
        let status = response.status();

        // Headers arrived, so the adapter has run the operation.
        let bytes = to_bytes(Body::new(response.into_body()), self.max_response_bytes)
            .await
            .map_err(|e| {
                UpstreamError::InvalidResponse(format!(
                    "status {}: body unreadable or over {} bytes: {}",
                    status, self.max_response_bytes, e
                ))
            })?;

        serde_json::from_slice::<AdapterResult>(&bytes).map_err(|e| {
            UpstreamError::InvalidResponse(format!("status {}: {}", status, e))
        })
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn execute(
        &self,
        request: &AdapterRequest,
        request_id: &str,
    ) -> Result<AdapterResult, UpstreamError> {
        let body = serde_json::to_vec(&request.to_wire())
            .map_err(|e| UpstreamError::Encode(e.to_string()))?;

        with_deadline(self.timeout, self.send(body, request_id))
            .await
            .map_err(|elapsed| UpstreamError::Timeout(elapsed.0))?
    }
}
