// src/server/connection_loop.rs

//! Contains the main server loop for accepting connections and handling graceful shutdown.

use super::context::ServerContext;
use crate::connection::{ConnectionHandler, is_normal_disconnect};
use crate::core::metrics;
use crate::core::state::Admission;
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// How long connection handlers get to finish after the shutdown signal.
const CLIENT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
const BACKGROUND_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// The main server loop. Accepts connections until `shutdown` resolves or a
/// background task fails, then shuts everything down.
pub async fn run(mut ctx: ServerContext, shutdown: impl Future<Output = ()>) {
    let mut client_tasks = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                info!("Shutdown requested, initiating graceful shutdown.");
                break;
            }

            Some(res) = ctx.background_tasks.join_next() => {
                match res {
                    Ok(Ok(())) => warn!("A background task finished unexpectedly without an error."),
                    Ok(Err(e)) => { error!("CRITICAL: Background task failed: {}. Shutting down.", e); break; }
                    Err(e) => { error!("CRITICAL: Background task panicked: {e:?}. Shutting down."); break; }
                }
            },

            res = ctx.listener.accept() => {
                match res {
                    Ok((socket, addr)) => {
                        metrics::CONNECTIONS_RECEIVED_TOTAL.inc();
                        match ctx.state.policy.admit(addr.ip()) {
                            Admission::Admitted => {}
                            Admission::Banned => {
                                debug!("Rejecting connection from banned address {}.", addr);
                                reject(socket, "banned");
                                continue;
                            }
                            Admission::TooManyConnections => {
                                warn!(
                                    "Rejecting connection from {}: max_connections_per_ip ({}) reached.",
                                    addr, ctx.state.config.policy.max_connections_per_ip
                                );
                                reject(socket, "per_ip_limit");
                                continue;
                            }
                        }

                        let Ok(permit) = ctx.connection_permits.clone().try_acquire_owned() else {
                            warn!(
                                "Rejecting connection from {}: max_clients ({}) reached.",
                                addr, ctx.state.config.max_clients
                            );
                            ctx.state.policy.release(addr.ip());
                            reject(socket, "max_clients");
                            continue;
                        };
                        let Some(session_id) = ctx.state.next_session_id() else {
                            error!("Session ids exhausted; rejecting connection from {}.", addr);
                            ctx.state.policy.release(addr.ip());
                            reject(socket, "session_ids_exhausted");
                            continue;
                        };

                        ctx.state.stats.increment_total_connections();
                        info!("Accepted new connection from {} as session {}", addr, session_id);
                        if let Err(e) = socket.set_nodelay(true) {
                            debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
                        }

                        let handler = ConnectionHandler::new(
                            socket,
                            addr,
                            ctx.state.clone(),
                            session_id,
                            ctx.shutdown_tx.subscribe(),
                        );
                        client_tasks.spawn(async move {
                            let _permit = permit;
                            if let Err(e) = handler.run().await {
                                if is_normal_disconnect(&e) {
                                    debug!("Connection from {} closed while writing: {}", addr, e);
                                } else {
                                    warn!("Connection from {} terminated unexpectedly: {}", addr, e);
                                }
                            }
                        });
                    }
                    Err(e) => error!("Failed to accept connection: {}", e),
                }
            },

            Some(res) = client_tasks.join_next() => {
                if let Err(e) = res
                    && e.is_panic()
                {
                    error!("A connection handler panicked: {e:?}");
                }
            },
        }
    }

    // Stop accepting before telling anyone to stop.
    drop(ctx.listener);

    info!("Shutting down. Sending signal to all tasks.");
    if ctx.shutdown_tx.send(()).is_err() {
        debug!("No task was listening for the shutdown signal.");
    }

    if tokio::time::timeout(CLIENT_DRAIN_TIMEOUT, async {
        while client_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for connections to close; aborting the rest.");
        client_tasks.shutdown().await;
    }
    info!(
        "All miner connections closed ({} served since startup).",
        ctx.state.stats.get_total_connections()
    );

    info!("Waiting for background tasks to finish...");
    if tokio::time::timeout(BACKGROUND_DRAIN_TIMEOUT, async {
        while ctx.background_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for background tasks to finish cleanly.");
        ctx.background_tasks.shutdown().await;
    };
    info!("Server shutdown complete.");
}

/// Closes a connection that was refused on accept.
fn reject(socket: TcpStream, reason: &str) {
    metrics::CONNECTIONS_REJECTED_TOTAL
        .with_label_values(&[reason])
        .inc();
    drop(socket);
}
