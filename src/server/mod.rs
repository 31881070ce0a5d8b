// src/server/mod.rs

use crate::config::Config;
use crate::core::state::ServerState;
use crate::core::work::WorkSource;
use anyhow::{Result, anyhow};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

mod connection_loop;
mod context;
mod initialization;
mod metrics_server;
mod spawner;

/// The main server startup function. Runs until SIGINT or SIGTERM.
pub async fn run(config: Config) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow!("Failed to register SIGINT handler: {}", e))?;
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow!("Failed to register SIGTERM handler: {}", e))?;

    // 1. Initialize server state and bind the listener.
    let mut server_context = initialization::setup(ServerState::initialize(config)).await?;

    // 2. Spawn all background tasks.
    spawner::spawn_all(&mut server_context);

    // 3. Accept connections until a signal arrives.
    connection_loop::run(server_context, async move {
        tokio::select! {
            _ = sigint.recv() => info!("SIGINT received."),
            _ = sigterm.recv() => info!("SIGTERM received."),
        }
    })
    .await;

    Ok(())
}

/// Starts a server in the background with the mock work source.
pub async fn start(config: Config) -> Result<ServerHandle> {
    start_with_state(ServerState::initialize(config)).await
}

/// Starts a server in the background around an injected work source.
pub async fn start_with_work_source(
    config: Config,
    source: Arc<dyn WorkSource>,
) -> Result<ServerHandle> {
    start_with_state(ServerState::with_work_source(config, source)).await
}

async fn start_with_state(state: Arc<ServerState>) -> Result<ServerHandle> {
    let mut server_context = initialization::setup(state.clone()).await?;
    let local_addr = server_context.listener.local_addr()?;
    spawner::spawn_all(&mut server_context);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(connection_loop::run(server_context, async move {
        shutdown_rx.await.ok();
    }));

    Ok(ServerHandle {
        local_addr,
        state,
        shutdown_tx,
        task,
    })
}

/// A running server started with [`start`].
///
/// Dropping the handle without calling [`ServerHandle::shutdown`] also stops
/// the server, since the shutdown channel closes.
pub struct ServerHandle {
    local_addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// The address the listener is bound to, with the real port when the
    /// configuration asked for port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }

    /// Stops accepting, signals every connection and background task, and
    /// waits for them to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            error!("Server task failed during shutdown: {e:?}");
        }
    }
}
