//! depaudit - HTTP API server entry point
//!
//! Serves the submission and polling API. Unless `worker.embedded` is
//! disabled, worker loops run in the same process.

use std::net::SocketAddr;

use tokio::net::TcpListener;

use depaudit::{Config, create_app, init_tracing, shutdown_signal};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    run_server().await
}

/// Run the HTTP server
async fn run_server() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = dotenvy::dotenv() {
        // Only warn if it's not a "file not found" error
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    let config = Config::load().map_err(|e| {
        std::io::Error::other(format!(
            "Failed to load configuration. Check config/ and DEPAUDIT__* env vars: {}",
            e
        ))
    })?;

    init_tracing(&config.logging)?;

    tracing::info!("Starting depaudit server...");
    tracing::info!(
        backend = ?config.queue.backend,
        embedded_workers = config.worker.embedded,
        "Configuration loaded: server={}:{}",
        config.server.host,
        config.server.port
    );

    let server_host = config.server.host.clone();
    let server_port = config.server.port;
    let enable_docs = config.server.enable_docs;
    let drain_timeout = config.worker.drain_timeout();

    let app_handle = create_app(config).await.map_err(|e| {
        Box::new(std::io::Error::other(format!(
            "Failed to create application: {}",
            e
        )))
    })?;

    let addr = SocketAddr::new(server_host.parse()?, server_port);

    tracing::info!("Server listening on {}", addr);
    if enable_docs {
        tracing::info!(
            "OpenAPI document available at http://{}/api-docs/openapi.json",
            addr
        );
    }

    let listener = TcpListener::bind(addr).await?;
    let router = app_handle.router.clone();
    let shutdown_token = app_handle.shutdown_token.clone();

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tracing::info!("Cancelling background tasks...");
            shutdown_token.cancel();
        })
        .await?;

    app_handle.shutdown(drain_timeout).await;
    tracing::info!("Server shutdown complete");
    Ok(())
}
