//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → throttle.rs (client locked out? → 429, nothing else runs)
//!     → credentials.rs (decode Basic header, constant-time verify → 401 on failure)
//!     → throttle.rs (record failure or clear history)
//!     → Pass to payload parsing
//! ```
//!
//! # Design Decisions
//! - Fail closed: missing, undecodable or wrong credentials are all a 401
//! - No session state; the configured set is immutable and passed explicitly
//! - Credentials never reach logs or error bodies

pub mod credentials;
pub mod throttle;

pub use credentials::{Credential, CredentialVerifier};
pub use throttle::{AttemptThrottle, ClientKey};
