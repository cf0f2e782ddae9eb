//! Typed HTTP client for the gateway.
//!
//! Used by the CLI and the integration tests. Speaks the same wire the
//! gateway exposes: Basic auth, JSON or YAML bodies, errors as `{kind, message}`.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;

use crate::payload::{parse, serialize, Format, FormatError, Payload};
use crate::protocol::ErrorDetail;
use crate::security::Credential;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("payload error: {0}")]
    Format(#[from] FormatError),

    /// The gateway answered with a structured error.
    #[error("gateway returned {status}: {error}")]
    Gateway { status: StatusCode, error: ErrorDetail },

    /// The gateway answered with a non-2xx status and an unrecognizable body.
    #[error("gateway returned {status}")]
    Status { status: StatusCode },
}

/// Raw answer to a route call.
#[derive(Debug, Clone)]
pub struct RouteResponse {
    pub status: StatusCode,
    pub format: Format,
    pub body: Vec<u8>,
}

impl RouteResponse {
    pub fn payload(&self) -> Result<Payload, FormatError> {
        parse(&self.body, self.format)
    }
}

#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<Credential>,
}

impl GatewayClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Credential) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Send raw bytes to a route; no status interpretation.
    pub async fn call(
        &self,
        route: &str,
        body: impl Into<Vec<u8>>,
        format: Format,
    ) -> Result<RouteResponse, ClientError> {
        let mut request = self
            .http
            .post(format!("{}/{}", self.base_url, route))
            .header(CONTENT_TYPE, format.content_type())
            .body(body.into());
        if let Some(credentials) = &self.credentials {
            request = request.header(AUTHORIZATION, credentials.to_basic_header());
        }

        let response = request.send().await?;
        let status = response.status();
        let format = Format::from_content_type(
            response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        );
        let body = response.bytes().await?.to_vec();
        Ok(RouteResponse {
            status,
            format,
            body,
        })
    }

    /// Send a payload and decode the success body, or the error.
    pub async fn call_payload(
        &self,
        route: &str,
        payload: &Payload,
        format: Format,
    ) -> Result<Payload, ClientError> {
        let response = self.call(route, serialize(payload, format)?, format).await?;
        if response.status.is_success() {
            return Ok(response.payload()?);
        }
        let error = response
            .payload()
            .ok()
            .map(serde_json::Value::from)
            .and_then(|value| serde_json::from_value::<ErrorDetail>(value).ok());
        Err(match error {
            Some(error) => ClientError::Gateway {
                status: response.status,
                error,
            },
            None => ClientError::Status {
                status: response.status,
            },
        })
    }

    pub async fn health(&self) -> Result<serde_json::Value, ClientError> {
        self.get_json("/health").await
    }

    pub async fn routes(&self) -> Result<serde_json::Value, ClientError> {
        self.get_json("/").await
    }

    async fn get_json(&self, path: &str) -> Result<serde_json::Value, ClientError> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status { status });
        }
        Ok(response.json().await?)
    }
}
