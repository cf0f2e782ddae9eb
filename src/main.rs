//! Pacmaster gateway: the client-facing tier.

use tokio::net::TcpListener;

use pacmaster::config::load_gateway_config;
use pacmaster::lifecycle::signals;
use pacmaster::observability::{init_logging, metrics};
use pacmaster::{GatewayServer, Shutdown};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_gateway_config()?;
    init_logging(&config.observability, "pacmaster_gateway");

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "pacmaster gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        users = config.auth.users.len(),
        max_attempts = config.retries.max_attempts,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = GatewayServer::new(&config)?;

    let shutdown = Shutdown::new();
    signals::install(shutdown.clone());
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
