// src/server/metrics_server.rs

use crate::core::metrics::{self, gather_metrics};
use crate::core::state::ServerState;
use anyhow::Result;
use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Handles HTTP requests to the /metrics endpoint.
///
/// It refreshes the connected-miner gauge from the registry before gathering
/// all registered metrics in the Prometheus text format.
async fn metrics_handler(state: Arc<ServerState>) -> impl IntoResponse {
    metrics::CONNECTED_MINERS.set(state.connections.len() as f64);

    let body = gather_metrics();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        body,
    )
}

/// Runs a simple HTTP server to expose Prometheus metrics on /metrics.
pub async fn run_metrics_server(
    state: Arc<ServerState>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let host = state.config.host.clone();
    let port = state.config.metrics.port;

    let app = Router::new().route("/metrics", get(move || metrics_handler(state.clone())));

    let listener = match tokio::net::TcpListener::bind((host.as_str(), port)).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind metrics server on {}:{}: {}", host, port, e);
            return Ok(());
        }
    };
    info!(
        "Prometheus metrics server listening on http://{}:{}/metrics",
        host, port
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_rx.recv().await.ok();
            info!("Metrics server shutting down.");
        })
        .await?;
    Ok(())
}
