//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! built-in defaults
//!     → loader.rs (optional TOML file from PACMASTER_CONFIG)
//!     → loader.rs (environment overrides: PORT, DB_MANAGER_HOST, ...)
//!     → validation.rs (semantic checks, all errors collected)
//!     → GatewayConfig / DbManagerConfig (validated, immutable)
//!     → shared via Arc to the servers
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_db_manager_config, load_gateway_config, ConfigError, CONFIG_PATH_ENV};
pub use schema::{
    AuthConfig, DbManagerConfig, GatewayConfig, LimitsConfig, ListenerConfig,
    ObservabilityConfig, RetryConfig, StoreBackend, StoreConfig, TimeoutConfig, UpstreamConfig,
};
pub use validation::ValidationError;
