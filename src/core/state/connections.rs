// src/core/state/connections.rs

//! The registry of live miner connections that broadcasts iterate over.

use crate::connection::SessionSnapshot;
use crate::core::protocol::Message;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

/// How many pushed messages may wait for a slow miner before pushes are dropped.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 64;

pub type ShutdownSender = broadcast::Sender<()>;

/// Everything another task needs to reach a connection.
///
/// The handler task owns the socket; others only enqueue messages on
/// `outbound`, which the handler writes in order.
#[derive(Debug, Clone)]
pub struct ConnectionEntry {
    pub addr: SocketAddr,
    pub outbound: mpsc::Sender<Message>,
    /// Fires to terminate this one connection.
    pub kill: ShutdownSender,
    pub session: Arc<Mutex<SessionSnapshot>>,
}

/// The result of delivering one message to every registered connection.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    /// Connections whose queue was full; they stay registered.
    pub skipped: usize,
    /// Connections found closed and removed from the registry.
    pub removed: usize,
}

/// A concurrent map of live connections keyed by session id.
///
/// Iteration works on a copied snapshot, so handlers can register and
/// deregister while a broadcast is in flight without waiting on it.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    entries: DashMap<u64, ConnectionEntry>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, session_id: u64, entry: ConnectionEntry) {
        debug!("Registering session {} ({})", session_id, entry.addr);
        self.entries.insert(session_id, entry);
    }

    /// Removes a connection. Returns false if it was already gone.
    pub fn deregister(&self, session_id: u64) -> bool {
        self.entries.remove(&session_id).is_some()
    }

    pub fn contains(&self, session_id: u64) -> bool {
        self.entries.contains_key(&session_id)
    }

    pub fn get(&self, session_id: u64) -> Option<ConnectionEntry> {
        self.entries.get(&session_id).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copies out the current set of connections, sorted by session id.
    /// No map lock is held once this returns.
    pub fn snapshot(&self) -> Vec<(u64, ConnectionEntry)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        entries.sort_unstable_by_key(|(id, _)| *id);
        entries
    }

    /// Calls `f` once per connection in a snapshot taken at call time.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(u64, &ConnectionEntry),
    {
        for (id, entry) in self.snapshot() {
            f(id, &entry);
        }
    }

    /// Enqueues `message` for every registered connection.
    ///
    /// Closed connections are deregistered; full queues are skipped.
    pub fn broadcast(&self, message: &Message) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        self.for_each(|id, entry| match entry.outbound.try_send(message.clone()) {
            Ok(()) => report.delivered += 1,
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Outbound queue full for session {} ({}); dropping push.",
                    id, entry.addr
                );
                report.skipped += 1;
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Session {} closed mid-broadcast; removing it.", id);
                if self.deregister(id) {
                    report.removed += 1;
                }
            }
        });
        report
    }

    /// Enqueues `message` for a single connection. Returns false if the
    /// connection is gone or its queue is full.
    pub fn send_to(&self, session_id: u64, message: Message) -> bool {
        let Some(entry) = self.get(session_id) else {
            return false;
        };
        match entry.outbound.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Closed(_)) => {
                self.deregister(session_id);
                false
            }
        }
    }

    /// Asks one connection to close. Returns false if it is not registered.
    pub fn kill(&self, session_id: u64) -> bool {
        match self.get(session_id) {
            Some(entry) => entry.kill.send(()).is_ok(),
            None => false,
        }
    }

    /// Asks every connection from `ip` to close. Returns how many were signalled.
    pub fn kill_ip(&self, ip: IpAddr) -> usize {
        let mut killed = 0;
        self.for_each(|_, entry| {
            if entry.addr.ip() == ip && entry.kill.send(()).is_ok() {
                killed += 1;
            }
        });
        killed
    }

    /// Diagnostic copies of every live session, sorted by session id.
    pub fn sessions(&self) -> Vec<SessionSnapshot> {
        self.snapshot()
            .into_iter()
            .map(|(_, entry)| entry.session.lock().clone())
            .collect()
    }

    pub fn authorized_count(&self) -> usize {
        self.snapshot()
            .iter()
            .filter(|(_, entry)| entry.session.lock().authorized)
            .count()
    }
}
