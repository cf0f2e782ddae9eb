//! Gateway subsystem (the client-facing tier).
//!
//! # Data Flow
//! ```text
//! POST /{route} (JSON or YAML, Basic auth)
//!     → server.rs (request ID, body limit, format from Content-Type)
//!     → dispatcher.rs (throttle, auth, route, parse, shape check)
//!     → upstream.rs (JSON to POST /v1/execute, ≤ 2 attempts)
//!     → dispatcher.rs (relay body or map ErrorDetail to a status)
//!     → response in the client's declared format
//! ```
//!
//! # Design Decisions
//! - Never touches the database; the adapter is the only path to storage
//! - Rejections before the upstream step cost no backend call

pub mod dispatcher;
pub mod server;
pub mod upstream;

pub use dispatcher::{Dispatcher, Reply};
pub use server::GatewayServer;
pub use upstream::{HttpUpstream, Upstream, UpstreamError};
