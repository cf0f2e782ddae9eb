//! Shared utilities for integration testing.
//!
//! Every helper binds `127.0.0.1:0`, so tests can run in parallel.

#![allow(dead_code)]

use axum::{body::Bytes, http::StatusCode, routing::post, Router};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use pacmaster::config::{DbManagerConfig, GatewayConfig};
use pacmaster::persistence::MemoryStore;
use pacmaster::protocol::EXECUTE_PATH;
use pacmaster::security::Credential;
use pacmaster::{DbManagerServer, GatewayClient, GatewayServer, Shutdown};

pub const USER: &str = "alice";
pub const PASSWORD: &str = "secret";

/// A running gateway plus whatever it forwards to.
pub struct Stack {
    pub gateway: SocketAddr,
    pub adapter: SocketAddr,
    pub shutdown: Shutdown,
}

impl Stack {
    pub fn url(&self) -> String {
        format!("http://{}", self.gateway)
    }

    pub fn client(&self) -> GatewayClient {
        GatewayClient::new(self.url()).with_credentials(Credential::new(USER, PASSWORD))
    }

    pub fn anonymous_client(&self) -> GatewayClient {
        GatewayClient::new(self.url())
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub fn gateway_config(adapter: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.address = adapter.to_string();
    config.upstream.timeout_ms = 1_000;
    config.auth.users.push(Credential::new(USER, PASSWORD));
    config.retries.base_delay_ms = 10;
    config.retries.max_delay_ms = 20;
    config
}

/// Start a db manager backed by a fresh in-memory store.
pub async fn start_db_manager(shutdown: &Shutdown) -> SocketAddr {
    let mut config = DbManagerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    let server = DbManagerServer::new(&config, Arc::new(MemoryStore::new()));

    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });
    addr
}

pub async fn start_gateway(config: GatewayConfig, shutdown: &Shutdown) -> SocketAddr {
    let server = GatewayServer::new(&config).unwrap();
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });
    addr
}

/// Gateway in front of a real db manager.
pub async fn start_stack() -> Stack {
    let shutdown = Shutdown::new();
    let adapter = start_db_manager(&shutdown).await;
    let gateway = start_gateway(gateway_config(adapter), &shutdown).await;
    wait_until_ready(gateway).await;
    Stack {
        gateway,
        adapter,
        shutdown,
    }
}

/// Gateway in front of a scripted adapter.
pub async fn start_stack_with_adapter<F, Fut>(f: F) -> Stack
where
    F: Fn(Bytes) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let shutdown = Shutdown::new();
    let adapter = start_programmable_adapter(f, &shutdown).await;
    let gateway = start_gateway(gateway_config(adapter), &shutdown).await;
    wait_until_ready(gateway).await;
    Stack {
        gateway,
        adapter,
        shutdown,
    }
}

/// Start a fake adapter whose `/v1/execute` answers come from `f`.
pub async fn start_programmable_adapter<F, Fut>(f: F, shutdown: &Shutdown) -> SocketAddr
where
    F: Fn(Bytes) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let app = Router::new().route(
        EXECUTE_PATH,
        post(move |body: Bytes| {
            let f = f.clone();
            async move {
                let (status, body) = f(body).await;
                (
                    StatusCode::from_u16(status).unwrap(),
                    [("content-type", "application/json")],
                    body,
                )
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let mut rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.recv().await;
            })
            .await;
    });
    addr
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub async fn wait_until_ready(addr: SocketAddr) {
    let client = GatewayClient::new(format!("http://{}", addr));
    for _ in 0..50 {
        if client.health().await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("server at {addr} never became ready");
}
