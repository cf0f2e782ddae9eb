//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Both tiers produce:
//!     → logging.rs (structured tracing events, request_id / route / kind fields)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout log aggregation
//!     → optional Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Request ID flows from the gateway into the adapter's logs
//! - Credentials and raw payloads are never logged

pub mod logging;
pub mod metrics;
pub use logging::init_logging;
