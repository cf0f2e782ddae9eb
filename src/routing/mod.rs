//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! POST /{route} path segment
//!     → route.rs (lookup in the fixed table)
//!     → Return: Route or UnknownRoute (404, no backend call)
//! ```
//!
//! # Design Decisions
//! - Routes compiled in, immutable at runtime
//! - Exact name match, case-sensitive
//! - The same table is used by the gateway and the persistence adapter

pub mod route;

pub use route::{Route, UnknownRoute};
