// Flowgate API server
// Decision: The worker and the HTTP server share one process and one in-memory engine
// Decision: Ctrl-C stops the HTTP server first, then drains the worker

use std::sync::Arc;

use anyhow::{Context, Result};
use flowgate_control_plane::telemetry::{init_telemetry, TelemetryConfig};
use flowgate_control_plane::{build_app, AppConfig};
use flowgate_core::GatewayContext;
use flowgate_worker::DurableWorker;

#[tokio::main]
async fn main() -> Result<()> {
    // Configuration first so .env can set RUST_LOG
    let config = AppConfig::from_env();

    init_telemetry(&TelemetryConfig::from_env());

    tracing::info!("flowgate-control-plane starting...");

    let worker = DurableWorker::new(config.worker.clone());
    worker.start().await.context("Failed to start worker")?;

    let gateway = GatewayContext::new(Arc::new(worker.backend()), config.gateway.clone());
    let app = build_app(gateway, config.cors_origins.clone());

    let listener = tokio::net::TcpListener::bind(&config.http_addr)
        .await
        .with_context(|| format!("Failed to bind to address {}", config.http_addr))?;
    tracing::info!("HTTP server listening on {}", config.http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("HTTP server stopped, draining worker");
    worker.shutdown().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
