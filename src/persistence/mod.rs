//! Persistence subsystem (the db manager tier).
//!
//! # Data Flow
//! ```text
//! POST /v1/execute (from the gateway only)
//!     → server.rs (decode wire request, request ID)
//!     → adapter.rs (route dispatch, store deadline, error classification)
//!     → requests.rs (typed input per route)
//!     → store/ (memory or postgres)
//!     → AdapterResult {status: success|failure}
//! ```
//!
//! # Design Decisions
//! - Upstream authentication is assumed; this tier is never client-facing
//! - One store call per request; atomicity lives inside the store

pub mod adapter;
pub mod requests;
pub mod server;
pub mod store;

pub use adapter::PersistenceAdapter;
pub use server::DbManagerServer;
pub use store::{MemoryStore, Store, StoreError};
