//! HTTP protocol handling shared by both tiers.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware: request ID, trace, timeout, body limit)
//!     → request.rs (request ID, declared format, credentials, peer address)
//!     → [gateway dispatcher | persistence adapter]
//!     → response.rs (render payload or error in the declared format)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{serve, with_middleware};
