//! Gateway HTTP surface.
//!
//! - `POST /{route}`: authenticated route call, JSON or YAML in and out
//! - `GET /health`: liveness, no credentials needed
//! - `GET /`: route catalogue

use axum::{
    body::{to_bytes, Body},
    extract::{Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::config::{GatewayConfig, LimitsConfig};
use crate::gateway::dispatcher::{Dispatcher, Reply};
use crate::gateway::upstream::{HttpUpstream, Upstream, UpstreamError};
use crate::http::{request, serve, with_middleware};
use crate::observability::metrics;
use crate::protocol::{ErrorDetail, ErrorKind};
use crate::routing::Route;

/// How often idle throttle entries are swept.
const THROTTLE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
struct GatewayState {
    dispatcher: Arc<Dispatcher>,
    max_body_bytes: usize,
}

/// Client-facing HTTP server.
pub struct GatewayServer {
    router: Router,
    dispatcher: Arc<Dispatcher>,
}

impl GatewayServer {
    /// Build a gateway that talks to the configured adapter over HTTP.
    pub fn new(config: &GatewayConfig) -> Result<Self, UpstreamError> {
        let upstream = HttpUpstream::new(&config.upstream)?;
        tracing::info!(upstream = %upstream.uri(), "Persistence adapter configured");
        Ok(Self::with_upstream(config, Arc::new(upstream)))
    }

    pub fn with_upstream(config: &GatewayConfig, upstream: Arc<dyn Upstream>) -> Self {
        let dispatcher = Arc::new(Dispatcher::from_config(config, upstream));
        let router = build_router(dispatcher.clone(), &config.limits);
        Self {
            router: with_middleware(router, &config.timeouts, &config.limits),
            dispatcher,
        }
    }

    /// The fully layered router, for in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let dispatcher = self.dispatcher.clone();
        let purge = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(THROTTLE_PURGE_INTERVAL);
            loop {
                ticker.tick().await;
                dispatcher.throttle().purge_stale();
            }
        });

        let result = serve(listener, self.router, shutdown).await;
        purge.abort();
        result
    }
}

fn build_router(dispatcher: Arc<Dispatcher>, limits: &LimitsConfig) -> Router {
    let state = GatewayState {
        dispatcher,
        max_body_bytes: limits.max_body_bytes,
    };
    Router::new()
        .route("/", get(catalogue))
        .route("/health", get(health))
        .route("/{route}", post(call_route))
        .with_state(state)
}

async fn call_route(
    State(state): State<GatewayState>,
    Path(route): Path<String>,
    request: Request,
) -> Response {
    let start = Instant::now();
    let (parts, body) = request.into_parts();
    let request_id = request::request_id(&parts.headers);
    let format = request::declared_format(&parts.headers);
    let credentials = request::credentials(&parts.headers);
    let client_ip = request::client_ip(&parts.extensions).map(|ip| ip.to_string());

    let route_label = route
        .parse::<Route>()
        .map(|r| r.name())
        .unwrap_or("unknown");

    let reply = match to_bytes(Body::new(body), state.max_body_bytes).await {
        Ok(raw) => {
            state
                .dispatcher
                .handle(
                    &route,
                    &raw,
                    format,
                    credentials,
                    client_ip.as_deref(),
                    &request_id,
                )
                .await
        }
        Err(e) => {
            tracing::warn!(request_id = %request_id, route = %route, error = %e, "Failed to read request body");
            let mut reply = Reply::error(
                &ErrorDetail::new(ErrorKind::Validation, "request body too large"),
                format,
            );
            reply.status = StatusCode::PAYLOAD_TOO_LARGE;
            reply
        }
    };

    metrics::record_request(route_label, reply.status.as_u16(), start);
    tracing::info!(
        request_id = %request_id,
        route = %route,
        status = reply.status.as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );
    reply.into_response()
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn catalogue() -> impl IntoResponse {
    let routes: Vec<_> = Route::ALL
        .iter()
        .map(|route| {
            serde_json::json!({
                "route": route.name(),
                "read_only": route.is_read_only(),
                "summary": route.summary(),
            })
        })
        .collect();
    Json(serde_json::json!({ "routes": routes }))
}
