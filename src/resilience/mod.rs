//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Gateway → adapter call:
//!     → timeouts.rs (per-attempt deadline)
//!     → On transient failure: retries.rs (one retry after a jittered delay)
//!
//! Adapter → store call:
//!     → timeouts.rs (per-operation deadline)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Only unavailability is retried, never a rejected request

pub mod retries;
pub mod timeouts;

pub use retries::RetryPolicy;
pub use timeouts::{with_deadline, Elapsed};
