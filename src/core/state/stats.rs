// src/core/state/stats.rs

//! Contains state definitions and logic for server statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Holds all server-wide counters exposed for diagnostics.
#[derive(Debug)]
pub struct StatsState {
    /// The total number of connections accepted by the server since startup.
    total_connections: AtomicU64,
    shares_accepted: AtomicU64,
    shares_rejected: AtomicU64,
    /// Jobs delivered by the periodic broadcaster (not per-miner pushes).
    jobs_broadcast: AtomicU64,
}

impl Default for StatsState {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsState {
    /// Creates a new `StatsState` with initialized counters.
    pub fn new() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            shares_accepted: AtomicU64::new(0),
            shares_rejected: AtomicU64::new(0),
            jobs_broadcast: AtomicU64::new(0),
        }
    }

    /// Atomically increments the total number of connections received.
    pub fn increment_total_connections(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Gets the total number of connections received.
    pub fn get_total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    pub fn record_share(&self, accepted: bool) {
        if accepted {
            self.shares_accepted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.shares_rejected.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn get_shares_accepted(&self) -> u64 {
        self.shares_accepted.load(Ordering::Relaxed)
    }

    pub fn get_shares_rejected(&self) -> u64 {
        self.shares_rejected.load(Ordering::Relaxed)
    }

    pub fn increment_jobs_broadcast(&self) {
        self.jobs_broadcast.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_jobs_broadcast(&self) -> u64 {
        self.jobs_broadcast.load(Ordering::Relaxed)
    }
}
