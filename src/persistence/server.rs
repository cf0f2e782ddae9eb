//! Db manager HTTP surface.
//!
//! - `POST /v1/execute`: wire request in, `AdapterResult` out (JSON only)
//! - `GET /health`: liveness
//! - `GET /test_db_connection`: store round trip

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::config::DbManagerConfig;
use crate::http::{request, response, serve, with_middleware};
use crate::payload::{parse, Format};
use crate::persistence::adapter::PersistenceAdapter;
use crate::persistence::store::Store;
use crate::protocol::{AdapterRequest, AdapterResult, ErrorDetail, EXECUTE_PATH};

#[derive(Clone)]
struct AdapterState {
    adapter: Arc<PersistenceAdapter>,
}

/// HTTP server for the persistence tier.
pub struct DbManagerServer {
    router: Router,
}

impl DbManagerServer {
    pub fn new(config: &DbManagerConfig, store: Arc<dyn Store>) -> Self {
        let adapter = PersistenceAdapter::new(
            store,
            Duration::from_millis(config.store.operation_timeout_ms),
        );
        let state = AdapterState {
            adapter: Arc::new(adapter),
        };

        let router = Router::new()
            .route(EXECUTE_PATH, post(execute))
            .route("/health", get(health))
            .route("/test_db_connection", get(test_db_connection))
            .with_state(state);

        Self {
            router: with_middleware(router, &config.timeouts, &config.limits),
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
        serve(listener, self.router, shutdown).await
    }
}

async fn execute(State(state): State<AdapterState>, headers: HeaderMap, body: Bytes) -> Response {
    let request_id = request::request_id(&headers);

    let wire = match parse(&body, Format::Json) {
        Ok(wire) => wire,
        Err(e) => return result_response(AdapterResult::failure(ErrorDetail::from(e))),
    };
    let request = match AdapterRequest::from_wire(wire) {
        Ok(request) => request,
        Err(error) => {
            tracing::warn!(request_id = %request_id, kind = %error.kind, "Rejected adapter request");
            return result_response(AdapterResult::failure(error));
        }
    };

    tracing::debug!(request_id = %request_id, route = %request.route, "Executing adapter request");
    let result = state
        .adapter
        .execute(request.route, &request.payload, &request_id)
        .await;
    result_response(result)
}

/// JSON body with an HTTP status mirroring the result.
fn result_response(result: AdapterResult) -> Response {
    let status = match &result {
        AdapterResult::Success { .. } => StatusCode::OK,
        AdapterResult::Failure { error } => error.status_code(),
    };
    match serde_json::to_vec(&result) {
        Ok(bytes) => (
            status,
            [(axum::http::header::CONTENT_TYPE, Format::Json.content_type())],
            bytes,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode adapter result");
            let fallback = AdapterResult::failure(ErrorDetail::internal());
            (StatusCode::INTERNAL_SERVER_ERROR, Json(fallback)).into_response()
        }
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn test_db_connection(State(state): State<AdapterState>) -> Response {
    match state.adapter.check_connection().await {
        Ok(body) => response::payload_response(StatusCode::OK, &body, Format::Json),
        Err(error) => response::error_response(&error, Format::Json),
    }
}
