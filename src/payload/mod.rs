//! Payload normalization subsystem.
//!
//! # Data Flow
//! ```text
//! raw request bytes + declared format (Content-Type)
//!     → format.rs (parse JSON or YAML, typed FormatError on failure)
//!     → value.rs (Payload tree: the only in-process representation)
//!     → format.rs (serialize back: JSON on the wire, declared format to the client)
//! ```
//!
//! # Design Decisions
//! - One value type for both formats; no format-specific trees leak past parsing
//! - Round trips are structural: `parse(serialize(p, f), f) == p`
//! - Nothing is ever coerced into an empty mapping on error

pub mod format;
pub mod value;

pub use format::{parse, serialize, Format, FormatError};
pub use value::{ConversionError, Mapping, Payload};
