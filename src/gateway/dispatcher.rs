//! Gateway dispatcher: the client-facing trust boundary.
//!
//! # Request pipeline
//! ```text
//! throttle check ─locked─▶ 429 throttled
//!     │
//! credentials ─absent/invalid─▶ 401 auth (failure recorded)
//!     │
//! route lookup ─unknown─▶ 404 notFound
//!     │
//! parse(raw, declared format) ─error─▶ 400 format
//!     │
//! AdapterRequest::new ─not a mapping / reserved key─▶ 400 validation
//!     │
//! upstream (≤ 2 attempts) ─network failure─▶ 502 backendUnavailable
//!     │
//! relay result in the declared format
//! ```
//! Nothing before the upstream step makes a backend call.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use std::time::Duration;

use crate::config::GatewayConfig;
use crate::gateway::upstream::{Upstream, UpstreamError};
use crate::http::response::{payload_response, with_retry_after, BASIC_CHALLENGE};
use crate::observability::metrics;
use crate::payload::{parse, Format, Payload};
use crate::protocol::{AdapterRequest, AdapterResult, ErrorDetail, ErrorKind};
use crate::resilience::RetryPolicy;
use crate::routing::Route;
use crate::security::{AttemptThrottle, Credential, CredentialVerifier};

/// Throttle key used when neither a peer address nor a username is known.
const ANONYMOUS_CLIENT: &str = "anonymous";

/// What the gateway answers, before transport framing.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    pub format: Format,
    pub body: Payload,
    pub kind: Option<ErrorKind>,
    /// Set on `throttled` replies.
    pub retry_after: Option<Duration>,
}

impl Reply {
    pub fn success(body: Payload, format: Format) -> Self {
        Self {
            status: StatusCode::OK,
            format,
            body,
            kind: None,
            retry_after: None,
        }
    }

    pub fn error(error: &ErrorDetail, format: Format) -> Self {
        Self {
            status: error.status_code(),
            format,
            body: error.to_payload(),
            kind: Some(error.kind),
            retry_after: None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.kind
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let mut response = payload_response(self.status, &self.body, self.format);
        if self.kind == Some(ErrorKind::Auth) {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(BASIC_CHALLENGE),
            );
        }
        match self.retry_after {
            Some(wait) => with_retry_after(response, wait),
            None => response,
        }
    }
}

pub struct Dispatcher {
    verifier: CredentialVerifier,
    throttle: AttemptThrottle,
    upstream: Arc<dyn Upstream>,
    retry: RetryPolicy,
}

impl Dispatcher {
    pub fn new(
        verifier: CredentialVerifier,
        throttle: AttemptThrottle,
        upstream: Arc<dyn Upstream>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            verifier,
            throttle,
            upstream,
            retry,
        }
    }

    pub fn from_config(config: &GatewayConfig, upstream: Arc<dyn Upstream>) -> Self {
        Self::new(
            CredentialVerifier::new(config.auth.users.clone()),
            AttemptThrottle::from_config(&config.auth),
            upstream,
            RetryPolicy::from_config(&config.retries),
        )
    }

    pub fn throttle(&self) -> &AttemptThrottle {
        &self.throttle
    }

    /// Handle one client request end to end.
    ///
    /// `client_key` is the peer IP when known; throttling falls back to the
    /// presented username otherwise.
    pub async fn handle(
        &self,
        route: &str,
        raw: &[u8],
        declared_format: Format,
        credentials: Option<Credential>,
        client_key: Option<&str>,
        request_id: &str,
    ) -> Reply {
        let key = client_key
            .or_else(|| credentials.as_ref().map(|c| c.username.as_str()))
            .unwrap_or(ANONYMOUS_CLIENT)
            .to_string();

        if let Some(wait) = self.throttle.check(&key) {
            tracing::warn!(request_id = %request_id, route = %route, kind = %ErrorKind::Throttled, "Client locked out");
            let error = ErrorDetail::new(
                ErrorKind::Throttled,
                "too many failed authentication attempts",
            );
            let mut reply = Reply::error(&error, declared_format);
            reply.retry_after = Some(wait);
            return reply;
        }

        let authenticated = credentials
            .as_ref()
            .map(|c| self.verifier.verify_credential(c))
            .unwrap_or(false);
        if !authenticated {
            self.throttle.record_failure(&key);
            tracing::warn!(
                request_id = %request_id,
                route = %route,
                kind = %ErrorKind::Auth,
                credentials_present = credentials.is_some(),
                "Authentication failed"
            );
            return Reply::error(&ErrorDetail::auth(), declared_format);
        }
        self.throttle.record_success(&key);

        let route: Route = match route.parse() {
            Ok(route) => route,
            Err(e) => {
                tracing::info!(request_id = %request_id, route = %route, kind = %ErrorKind::NotFound, "Unknown route");
                return Reply::error(&ErrorDetail::not_found(e.to_string()), declared_format);
            }
        };

        let payload = match parse(raw, declared_format) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::info!(request_id = %request_id, route = %route, kind = %ErrorKind::Format, error = %e, "Rejected payload");
                return Reply::error(&ErrorDetail::from(e), declared_format);
            }
        };

        let request = match AdapterRequest::new(route, payload) {
            Ok(request) => request,
            Err(error) => {
                tracing::info!(request_id = %request_id, route = %route, kind = %error.kind, "Rejected payload shape");
                return Reply::error(&error, declared_format);
            }
        };

        match self.forward(&request, request_id).await {
            Ok(AdapterResult::Success { body }) => Reply::success(body, declared_format),
            Ok(AdapterResult::Failure { error }) => {
                tracing::info!(request_id = %request_id, route = %route, kind = %error.kind, "Adapter reported failure");
                Reply::error(&error, declared_format)
            }
            Err(e) => {
                tracing::error!(request_id = %request_id, route = %route, error = %e, "Persistence service unreachable");
                let error = match e {
                    UpstreamError::Encode(_) => ErrorDetail::internal(),
                    _ => ErrorDetail::backend_unavailable("persistence service unavailable"),
                };
                Reply::error(&error, declared_format)
            }
        }
    }

    /// Call the adapter, retrying once when a second attempt cannot double a write.
    async fn forward(
        &self,
        request: &AdapterRequest,
        request_id: &str,
    ) -> Result<AdapterResult, UpstreamError> {
        let route = request.route;
        self.retry
            .execute(
                |attempt| async move {
                    if attempt > 1 {
                        metrics::record_retry(route.name());
                        tracing::warn!(request_id = %request_id, route = %route, attempt, "Retrying adapter call");
                    }
                    self.upstream.execute(request, request_id).await
                },
                |outcome| is_retryable(route, outcome),
            )
            .await
    }
}

fn is_retryable(route: Route, outcome: &Result<AdapterResult, UpstreamError>) -> bool {
    match outcome {
        Err(e) => e.is_retryable_for(route),
        Ok(AdapterResult::Failure { error }) => error.kind == ErrorKind::BackendUnavailable,
        Ok(AdapterResult::Success { .. }) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::serialize;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Upstream double that records calls and replays scripted outcomes.
    struct ScriptedUpstream {
        calls: Mutex<Vec<Payload>>,
        script: Mutex<Vec<Result<AdapterResult, UpstreamError>>>,
    }

    impl ScriptedUpstream {
        fn new(script: Vec<Result<AdapterResult, UpstreamError>>) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                script: Mutex::new(script),
            })
        }

        fn calls(&self) -> Vec<Payload> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Upstream for ScriptedUpstream {
        async fn execute(&self, request: &AdapterRequest, _: &str) -> Result<AdapterResult, UpstreamError> {
            self.calls.lock().unwrap().push(request.to_wire());
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                Ok(AdapterResult::success(Payload::Null))
            } else {
                script.remove(0)
            }
        }
    }

    fn alice() -> Credential {
        Credential::new("alice", "secret")
    }

    fn dispatcher(upstream: Arc<ScriptedUpstream>) -> Dispatcher {
        Dispatcher::new(
            CredentialVerifier::new(vec![alice()]),
            AttemptThrottle::new(3, Duration::from_secs(60), Duration::from_secs(300)),
            upstream,
            RetryPolicy::new(2, 1, 5),
        )
    }

    fn json(text: &str) -> Payload {
        parse(text.as_bytes(), Format::Json).unwrap()
    }

    #[tokio::test]
    async fn test_scenario_a_forwarding() {
        let upstream = ScriptedUpstream::new(vec![Ok(AdapterResult::success(json(r#"{"result":5}"#)))]);
        let d = dispatcher(upstream.clone());

        let reply = d
            .handle("sum", br#"{"a": 2, "b": 3}"#, Format::Json, Some(alice()), Some("10.0.0.1"), "r1")
            .await;

        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body, json(r#"{"result":5}"#));
        let calls = upstream.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            serialize(&calls[0], Format::Json).unwrap(),
            br#"{"route":"sum","a":2,"b":3}"#.to_vec()
        );
    }

    #[tokio::test]
    async fn test_scenario_b_yaml_forwards_identically() {
        let upstream = ScriptedUpstream::new(vec![Ok(AdapterResult::success(json(r#"{"result":5}"#)))]);
        let d = dispatcher(upstream.clone());

        let reply = d
            .handle("sum", b"a: 2\nb: 3\n", Format::Yaml, Some(alice()), None, "r1")
            .await;

        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.format, Format::Yaml);
        assert_eq!(serialize(&reply.body, Format::Yaml).unwrap(), b"result: 5\n".to_vec());
        assert_eq!(upstream.calls()[0], json(r#"{"route":"sum","a":2,"b":3}"#));
    }

    #[tokio::test]
    async fn test_auth_gate_makes_no_calls() {
        let upstream = ScriptedUpstream::new(vec![]);
        let d = dispatcher(upstream.clone());

        for credentials in [None, Some(Credential::new("alice", "wrong")), Some(Credential::new("", ""))] {
            let reply = d.handle("sum", b"{}", Format::Json, credentials, Some("10.0.0.2"), "r").await;
            assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
            assert_eq!(reply.error_kind(), Some(ErrorKind::Auth));
        }
        assert!(upstream.calls().is_empty());
    }

    #[tokio::test]
    async fn test_lockout_after_failures() {
        let upstream = ScriptedUpstream::new(vec![]);
        let d = dispatcher(upstream.clone());
        let bad = || Some(Credential::new("alice", "nope"));

        for _ in 0..3 {
            let reply = d.handle("sum", b"{}", Format::Json, bad(), Some("10.0.0.3"), "r").await;
            assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
        }

        // Even the right password is refused while locked.
        let reply = d.handle("sum", b"{}", Format::Json, Some(alice()), Some("10.0.0.3"), "r").await;
        assert_eq!(reply.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(reply.error_kind(), Some(ErrorKind::Throttled));
        assert!(reply.retry_after.is_some());

        // Other clients are unaffected.
        let reply = d
            .handle("sum", br#"{"a":1,"b":1}"#, Format::Json, Some(alice()), Some("10.0.0.4"), "r")
            .await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(upstream.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_route_after_auth() {
        let upstream = ScriptedUpstream::new(vec![]);
        let d = dispatcher(upstream.clone());

        let reply = d.handle("nope", b"{not parsed", Format::Json, Some(alice()), None, "r").await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);

        let reply = d.handle("nope", b"{}", Format::Json, None, None, "r").await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
        assert!(upstream.calls().is_empty());
    }

    #[tokio::test]
    async fn test_format_rejection() {
        let upstream = ScriptedUpstream::new(vec![]);
        let d = dispatcher(upstream.clone());

        for (raw, format) in [
            (&b"{\"a\": 2,"[..], Format::Json),
            (&b"a: [1, 2"[..], Format::Yaml),
            (&b""[..], Format::Json),
        ] {
            let reply = d.handle("sum", raw, format, Some(alice()), None, "r").await;
            assert_eq!(reply.status, StatusCode::BAD_REQUEST);
            assert_eq!(reply.error_kind(), Some(ErrorKind::Format));
        }
        assert!(upstream.calls().is_empty());
    }

    #[tokio::test]
    async fn test_non_mapping_and_reserved_key() {
        let upstream = ScriptedUpstream::new(vec![]);
        let d = dispatcher(upstream.clone());

        for raw in [&b"[1, 2]"[..], &br#"{"route": "delete_run"}"#[..]] {
            let reply = d.handle("sum", raw, Format::Json, Some(alice()), None, "r").await;
            assert_eq!(reply.error_kind(), Some(ErrorKind::Validation));
        }
        assert!(upstream.calls().is_empty());
    }

    #[tokio::test]
    async fn test_scenario_c_one_retry_then_502() {
        let unavailable = || Ok(AdapterResult::failure(ErrorDetail::backend_unavailable("down")));
        let upstream = ScriptedUpstream::new(vec![unavailable(), unavailable(), unavailable()]);
        let d = dispatcher(upstream.clone());

        let reply = d.handle("check_connection", b"{}", Format::Json, Some(alice()), None, "r").await;
        assert_eq!(reply.status, StatusCode::BAD_GATEWAY);
        assert_eq!(reply.error_kind(), Some(ErrorKind::BackendUnavailable));
        assert_eq!(upstream.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_transient_network_failure_recovers() {
        let upstream = ScriptedUpstream::new(vec![
            Err(UpstreamError::Connect("refused".into())),
            Ok(AdapterResult::success(json(r#"{"message":"ok"}"#))),
        ]);
        let d = dispatcher(upstream.clone());

        let reply = d.handle("check_connection", b"{}", Format::Json, Some(alice()), None, "r").await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(upstream.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_timed_out_write_not_repeated() {
        let upstream = ScriptedUpstream::new(vec![
            Err(UpstreamError::Timeout(Duration::from_secs(1))),
            Ok(AdapterResult::success(json(r#"{"message":"ok"}"#))),
        ]);
        let d = dispatcher(upstream.clone());

        let body = br#"{"id_run": 1, "log": "x"}"#;
        let reply = d.handle("insert_log", body, Format::Json, Some(alice()), None, "r").await;
        assert_eq!(reply.status, StatusCode::BAD_GATEWAY);
        assert_eq!(upstream.calls().len(), 1);

        let upstream = ScriptedUpstream::new(vec![
            Err(UpstreamError::Timeout(Duration::from_secs(1))),
            Ok(AdapterResult::success(json(r#"{"runs":[]}"#))),
        ]);
        let d = dispatcher(upstream.clone());
        let reply = d.handle("get_runs", b"{}", Format::Json, Some(alice()), None, "r").await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(upstream.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_terminal_failures_not_retried() {
        let upstream = ScriptedUpstream::new(vec![
            Err(UpstreamError::InvalidResponse("garbage".into())),
            Ok(AdapterResult::failure(ErrorDetail::validation("bad"))),
        ]);
        let d = dispatcher(upstream.clone());

        let reply = d.handle("get_runs", b"{}", Format::Json, Some(alice()), None, "r").await;
        assert_eq!(reply.status, StatusCode::BAD_GATEWAY);
        let reply = d.handle("get_runs", b"{}", Format::Json, Some(alice()), None, "r").await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(upstream.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_adapter_errors_relayed_with_status() {
        let upstream = ScriptedUpstream::new(vec![
            Ok(AdapterResult::failure(ErrorDetail::not_found("No runs found"))),
            Ok(AdapterResult::failure(ErrorDetail::internal())),
        ]);
        let d = dispatcher(upstream);

        let reply = d.handle("get_runs", b"{}", Format::Yaml, Some(alice()), None, "r").await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
        assert_eq!(reply.body.get("message").and_then(Payload::as_str), Some("No runs found"));
        let reply = d.handle("get_runs", b"{}", Format::Json, Some(alice()), None, "r").await;
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
