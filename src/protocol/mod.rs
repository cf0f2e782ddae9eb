//! Internal protocol between the gateway and the persistence adapter.
//!
//! # Data Flow
//! ```text
//! gateway: Payload + Route
//!     → wire.rs (AdapterRequest → JSON mapping with "route" key)
//!     → POST /v1/execute
//! adapter: AdapterResult (success body | ErrorDetail)
//!     → wire.rs (tagged by "status")
//!     → gateway relays body or maps error.rs kind → HTTP status
//! ```
//!
//! # Design Decisions
//! - JSON only; client format flexibility ends at the gateway
//! - ErrorDetail is the only error shape that crosses a process boundary

pub mod error;
pub mod wire;

pub use error::{ErrorDetail, ErrorKind};
pub use wire::{AdapterRequest, AdapterResult, EXECUTE_PATH, ROUTE_KEY};
