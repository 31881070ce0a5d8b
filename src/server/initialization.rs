// src/server/initialization.rs

//! Handles server initialization: logging the effective configuration and
//! binding the listener.

use super::context::ServerContext;
use crate::config::{Config, SubmitPolicy};
use crate::core::state::ServerState;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Initializes all server components before starting the main loop.
///
/// Failing to bind the listen address is fatal.
pub async fn setup(state: Arc<ServerState>) -> Result<ServerContext> {
    log_startup_info(&state.config);
    let (shutdown_tx, _) = broadcast::channel(1);

    let config = &state.config;
    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;
    info!(
        "Stratum server listening on {}",
        listener.local_addr().context("Listener has no local address")?
    );
    let connection_permits = Arc::new(Semaphore::new(config.max_clients));

    Ok(ServerContext {
        state,
        listener,
        shutdown_tx,
        background_tasks: JoinSet::new(),
        connection_permits,
    })
}

/// Logs key configuration parameters at startup.
fn log_startup_info(config: &Config) {
    let mining = &config.mining;
    info!(
        "Jobs every {:?} at difficulty {}; extranonce2 size {} bytes.",
        mining.broadcast_interval, mining.initial_difficulty, mining.extranonce2_size
    );
    info!(
        "Idle timeout {:?}; max request size {} bytes; max clients {}.",
        mining.idle_timeout, mining.max_request_size, config.max_clients
    );
    match mining.submit_policy {
        SubmitPolicy::Lenient => warn!(
            "Submit policy is 'lenient': shares are forwarded without checking authorization or job ids."
        ),
        SubmitPolicy::Strict => info!(
            "Submit policy is 'strict': shares need an authorized session and one of the last {} job ids.",
            mining.job_history
        ),
    }
    let policy = &config.policy;
    if policy.enabled {
        info!(
            "Abuse policy: {} connections per address; ban for {:?} after {} malformed lines or {}% invalid shares.",
            policy.max_connections_per_ip,
            policy.ban_duration,
            policy.malformed_limit,
            policy.invalid_share_percent
        );
    }
}
