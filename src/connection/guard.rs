// src/connection/guard.rs

//! Defines `ConnectionGuard`, an RAII guard for connection resource management.

use crate::core::metrics;
use crate::core::state::ServerState;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

/// An RAII guard that removes a connection from the registry, and gives back
/// its per-address slot, when its handler's scope is exited, however the
/// handler ends.
pub struct ConnectionGuard {
    /// A shared reference to the server state.
    pub(crate) state: Arc<ServerState>,
    /// The unique identifier for the miner session.
    pub(crate) session_id: u64,
    /// The network address of the miner.
    pub(crate) addr: SocketAddr,
}

impl ConnectionGuard {
    /// Creates a new `ConnectionGuard` for an already registered session.
    pub(crate) fn new(state: Arc<ServerState>, session_id: u64, addr: SocketAddr) -> Self {
        metrics::CONNECTED_MINERS.inc();
        Self {
            state,
            session_id,
            addr,
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        metrics::CONNECTED_MINERS.dec();
        debug!(
            "ConnectionGuard dropping, cleaning up session {} ({})",
            self.session_id, self.addr
        );

        // A broadcast that found the queue closed may already have removed it.
        if !self.state.connections.deregister(self.session_id) {
            debug!(
                "Session {} was not in the connection registry upon cleanup.",
                self.session_id
            );
        }
        self.state.policy.release(self.addr.ip());
    }
}
