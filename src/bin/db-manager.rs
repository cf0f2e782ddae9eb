//! Pacmaster db manager: the persistence tier.

use tokio::net::TcpListener;

use pacmaster::config::load_db_manager_config;
use pacmaster::lifecycle::signals;
use pacmaster::observability::{init_logging, metrics};
use pacmaster::persistence::store;
use pacmaster::{DbManagerServer, Shutdown};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_db_manager_config()?;
    init_logging(&config.observability, "db_manager");

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "pacmaster db manager starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        store = ?config.store,
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

    let store = store::connect(&config.store).await?;
    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    signals::install(shutdown.clone());
    DbManagerServer::new(&config, store)
        .run(listener, shutdown.subscribe())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
