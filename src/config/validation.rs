//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, at most one retry)
//! - Check addresses parse before any socket is opened
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: config → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;
use url::Url;

use crate::config::schema::{
    DbManagerConfig, GatewayConfig, LimitsConfig, ListenerConfig, ObservabilityConfig,
    StoreBackend, TimeoutConfig,
};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

pub fn validate_gateway(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_listener(&config.listener, &mut errors);
    check_common(&config.timeouts, &config.limits, &config.observability, &mut errors);

    match Url::parse(&format!("http://{}", config.upstream.address)) {
        Ok(url) if url.host_str().is_some() && url.port().is_some() && url.path() == "/" => {}
        _ => errors.push(ValidationError::new(
            "upstream.address",
            format!("expected host:port, got {:?}", config.upstream.address),
        )),
    }
    if config.upstream.timeout_ms == 0 {
        errors.push(ValidationError::new("upstream.timeout_ms", "must be greater than 0"));
    }
    if config.upstream.max_response_bytes == 0 {
        errors.push(ValidationError::new("upstream.max_response_bytes", "must be greater than 0"));
    }

    if config.auth.users.is_empty() {
        errors.push(ValidationError::new("auth.users", "at least one credential is required"));
    }
    for user in &config.auth.users {
        if user.username.is_empty() || user.password.is_empty() {
            errors.push(ValidationError::new("auth.users", "usernames and passwords must be non-empty"));
        }
        if user.username.contains(':') {
            errors.push(ValidationError::new("auth.users", "usernames must not contain ':'"));
        }
    }
    if config.auth.max_failed_attempts == 0 {
        errors.push(ValidationError::new("auth.max_failed_attempts", "must be greater than 0"));
    }
    if config.auth.failure_window_secs == 0 {
        errors.push(ValidationError::new("auth.failure_window_secs", "must be greater than 0"));
    }
    if config.auth.lockout_secs == 0 {
        errors.push(ValidationError::new("auth.lockout_secs", "must be greater than 0"));
    }

    if !(1..=2).contains(&config.retries.max_attempts) {
        errors.push(ValidationError::new(
            "retries.max_attempts",
            "must be 1 or 2 (at most one retry)",
        ));
    }
    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.base_delay_ms",
            "must not exceed retries.max_delay_ms",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn validate_db_manager(config: &DbManagerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_listener(&config.listener, &mut errors);
    check_common(&config.timeouts, &config.limits, &config.observability, &mut errors);

    if config.store.operation_timeout_ms == 0 {
        errors.push(ValidationError::new("store.operation_timeout_ms", "must be greater than 0"));
    }
    if config.store.max_connections == 0 {
        errors.push(ValidationError::new("store.max_connections", "must be greater than 0"));
    }
    if config.store.backend == StoreBackend::Postgres {
        if !cfg!(feature = "postgres") {
            errors.push(ValidationError::new(
                "store.backend",
                "postgres backend requires the `postgres` cargo feature",
            ));
        }
        match config.store.database_url.as_deref().map(Url::parse) {
            Some(Ok(url)) if matches!(url.scheme(), "postgres" | "postgresql") => {}
            Some(_) => errors.push(ValidationError::new(
                "store.database_url",
                "must be a postgres:// URL",
            )),
            None => errors.push(ValidationError::new(
                "store.database_url",
                "required for the postgres backend",
            )),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_listener(listener: &ListenerConfig, errors: &mut Vec<ValidationError>) {
    if listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("not a socket address: {:?}", listener.bind_address),
        ));
    }
}

fn check_common(
    timeouts: &TimeoutConfig,
    limits: &LimitsConfig,
    observability: &ObservabilityConfig,
    errors: &mut Vec<ValidationError>,
) {
    if timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if limits.max_body_bytes == 0 {
        errors.push(ValidationError::new("limits.max_body_bytes", "must be greater than 0"));
    }
    if !LOG_LEVELS.contains(&observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level {:?}", observability.log_level),
        ));
    }
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("not a socket address: {:?}", observability.metrics_address),
        ));
    }
}
