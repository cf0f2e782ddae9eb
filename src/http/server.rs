//! HTTP server plumbing shared by the gateway and the db manager.
//!
//! # Responsibilities
//! - Wire up middleware (request ID, tracing, timeout, body limit)
//! - Bind a router to a listener with peer addresses available
//! - Drain gracefully when the shutdown signal fires

use axum::{body::Body, extract::DefaultBodyLimit, http::Request, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{LimitsConfig, TimeoutConfig};
use crate::http::request::X_REQUEST_ID;
use crate::lifecycle::shutdown::wait_for;

/// Apply the common middleware stack.
///
/// Layer order (outermost first): request ID, trace, propagate, timeout, body limit.
#[allow(deprecated)]
pub fn with_middleware(router: Router, timeouts: &TimeoutConfig, limits: &LimitsConfig) -> Router {
    router
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(limits.max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(timeouts.request_secs)))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Serve `router` on `listener` until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "HTTP server starting");

    let app = router.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for(shutdown))
        .await?;

    tracing::info!(address = %addr, "HTTP server stopped");
    Ok(())
}
