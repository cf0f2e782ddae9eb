//! Pacmaster: a two-tier gateway in front of run/log/outcome storage.
//!
//! ```text
//!  client ──JSON/YAML + Basic auth──▶ gateway ──JSON /v1/execute──▶ db manager ──▶ store
//!                                       │                              │
//!                                  security, payload,             persistence
//!                                  routing, resilience            (memory | postgres)
//! ```

// Shared data model
pub mod payload;
pub mod protocol;
pub mod routing;

// Tiers
pub mod gateway;
pub mod persistence;

// Cross-cutting concerns
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub mod client;

pub use client::GatewayClient;
pub use config::{DbManagerConfig, GatewayConfig};
pub use gateway::GatewayServer;
pub use lifecycle::Shutdown;
pub use payload::{Format, Payload};
pub use persistence::DbManagerServer;
pub use routing::Route;
