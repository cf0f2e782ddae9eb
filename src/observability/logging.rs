//! Structured logging setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Build the filter: `RUST_LOG` wins, then the debug flag, then the configured level.
pub fn env_filter(config: &ObservabilityConfig, crate_target: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if config.debug { "debug" } else { config.log_level.as_str() };
        EnvFilter::new(format!("{crate_target}={level},pacmaster={level},tower_http={level}"))
    })
}

/// Initialize the global tracing subscriber.
pub fn init_logging(config: &ObservabilityConfig, crate_target: &str) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(config, crate_target))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
