// src/server/spawner.rs

//! Spawns all of the server's long-running background tasks.

use super::context::ServerContext;
use super::metrics_server;
use crate::core::tasks::job_broadcaster::JobBroadcaster;
use crate::core::tasks::policy_sweeper::PolicySweeper;
use tracing::info;

/// Spawns all background tasks into the context's JoinSet.
pub fn spawn_all(ctx: &mut ServerContext) {
    let server_state = &ctx.state;
    let shutdown_tx = &ctx.shutdown_tx;
    let background_tasks = &mut ctx.background_tasks;

    // --- Metrics Server ---
    if server_state.config.metrics.enabled {
        let metrics_state = server_state.clone();
        let shutdown_rx_metrics = shutdown_tx.subscribe();
        background_tasks.spawn(async move {
            metrics_server::run_metrics_server(metrics_state, shutdown_rx_metrics).await
        });
    } else {
        info!("Prometheus metrics server is disabled in the configuration.");
    }

    // --- Job Broadcaster ---
    let broadcaster = JobBroadcaster::new(server_state.clone());
    let shutdown_rx_broadcast = shutdown_tx.subscribe();
    background_tasks.spawn(async move {
        broadcaster.run(shutdown_rx_broadcast).await;
        Ok(())
    });

    // --- Policy Sweeper ---
    if server_state.config.policy.enabled {
        let sweeper = PolicySweeper::new(server_state.clone());
        let shutdown_rx_sweeper = shutdown_tx.subscribe();
        background_tasks.spawn(async move {
            sweeper.run(shutdown_rx_sweeper).await;
            Ok(())
        });
    } else {
        info!("Per-address abuse policy is disabled in the configuration.");
    }

    info!("All background tasks have been spawned.");
}
