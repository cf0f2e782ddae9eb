//! Configuration schema definitions.
//!
//! This module defines the configuration structure for both tiers.
//! All types derive Serde traits for deserialization from TOML files and
//! every field has a default so an empty file is a valid config.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::security::Credential;

/// Root configuration for the gateway tier.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Client-facing listener.
    pub listener: ListenerConfig,

    /// Where the persistence adapter lives.
    pub upstream: UpstreamConfig,

    /// Credential set and failed-attempt throttling.
    pub auth: AuthConfig,

    /// Retry policy for gateway → adapter calls.
    pub retries: RetryConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::with_port(10033),
            upstream: UpstreamConfig::default(),
            auth: AuthConfig::default(),
            retries: RetryConfig::default(),
            timeouts: TimeoutConfig::default(),
            limits: LimitsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Root configuration for the db manager tier.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DbManagerConfig {
    /// Internal listener (reachable from the gateway only).
    pub listener: ListenerConfig,

    /// Storage backend selection.
    pub store: StoreConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for DbManagerConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::with_port(5435),
            store: StoreConfig::default(),
            timeouts: TimeoutConfig::default(),
            limits: LimitsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:10033").
    pub bind_address: String,
}

impl ListenerConfig {
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_address: format!("0.0.0.0:{}", port),
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self::with_port(10033)
    }
}

/// Persistence adapter location as seen from the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Adapter address as `host:port`.
    pub address: String,

    /// Per-attempt deadline for one adapter call, in milliseconds. Keep it
    /// above the adapter's store deadline so a slow store is reported by
    /// the adapter instead of timing out here.
    pub timeout_ms: u64,

    /// Idle pooled connections are closed after this many seconds.
    pub pool_idle_timeout_secs: u64,

    /// Maximum response body accepted from the adapter.
    pub max_response_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:5435".to_string(),
            timeout_ms: 10_000,
            pool_idle_timeout_secs: 60,
            max_response_bytes: 8 * 1024 * 1024,
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Accepted username/password pairs.
    pub users: Vec<Credential>,

    /// Failures within the window before a client is locked out.
    pub max_failed_attempts: u32,

    /// Window over which failures are counted, in seconds.
    pub failure_window_secs: u64,

    /// Lockout duration in seconds.
    pub lockout_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            users: Vec::new(),
            max_failed_attempts: 5,
            failure_window_secs: 60,
            lockout_secs: 300,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable the single retry for transient failures.
    pub enabled: bool,

    /// Total attempts per request, original call included (1 or 2).
    pub max_attempts: u32,

    /// Base delay for the backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum backoff delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 2,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Whole-request deadline enforced by the server, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Debug mode forces debug-level logging.
    pub debug: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            debug: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Which store implementation backs the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgres,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            other => Err(format!("unknown store backend: {}", other)),
        }
    }
}

/// Store configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Connection URL, required for postgres.
    pub database_url: Option<String>,

    /// Connection pool size.
    pub max_connections: u32,

    /// Deadline for a single store operation, in milliseconds.
    pub operation_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            database_url: None,
            max_connections: 10,
            operation_timeout_ms: 5_000,
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("backend", &self.backend)
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("max_connections", &self.max_connections)
            .field("operation_timeout_ms", &self.operation_timeout_ms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:10033");
        assert_eq!(config.retries.max_attempts, 2);

        let config: DbManagerConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:5435");
        assert_eq!(config.store.backend, StoreBackend::Memory);
    }

    #[test]
    fn test_partial_toml() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [upstream]
            address = "db-manager:5435"

            [[auth.users]]
            username = "alice"
            password = "secret"
            "#,
        )
        .unwrap();
        assert_eq!(config.upstream.address, "db-manager:5435");
        assert_eq!(config.upstream.timeout_ms, 10_000);
        assert_eq!(config.auth.users, vec![Credential::new("alice", "secret")]);
        assert_eq!(config.auth.max_failed_attempts, 5);
    }

    #[test]
    fn test_gateway_deadline_outlasts_store_deadline() {
        let gateway = GatewayConfig::default();
        let store = StoreConfig::default();
        assert!(gateway.upstream.timeout_ms > store.operation_timeout_ms);

        let attempts = u64::from(gateway.retries.max_attempts);
        let worst_case_ms = attempts * gateway.upstream.timeout_ms + gateway.retries.max_delay_ms;
        assert!(worst_case_ms < gateway.timeouts.request_secs * 1_000);
    }

    #[test]
    fn test_store_debug_redacts_url() {
        let config = StoreConfig {
            database_url: Some("postgres://u:hunter2@db/x".into()),
            ..StoreConfig::default()
        };
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}
