// src/core/state/core.rs

//! Defines the central `ServerState` struct, holding all shared server-wide state.

use super::connections::ConnectionRegistry;
use super::policy::IpPolicy;
use super::stats::StatsState;
use crate::config::Config;
use crate::core::metrics;
use crate::core::work::{JobRegistry, MockWorkSource, WorkSource};
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// The largest session id. Ids must fit the eight-hex-digit extranonce1.
pub const MAX_SESSION_ID: u64 = u32::MAX as u64;

/// The central struct holding all shared, server-wide state.
///
/// Built once at startup, wrapped in an `Arc`, and handed to the accept loop,
/// every connection handler, and every background task.
#[derive(Debug)]
pub struct ServerState {
    /// The server configuration. Fixed for the lifetime of the process.
    pub config: Arc<Config>,
    /// All live miner connections, keyed by session id.
    pub connections: ConnectionRegistry,
    /// The current job, recent job history, and difficulty.
    pub jobs: JobRegistry,
    /// Holds all server-wide statistics.
    pub stats: StatsState,
    /// Per-address bans and limits.
    pub policy: IpPolicy,
    /// The last session id handed out. Never reused.
    session_seq: AtomicU64,
}

impl ServerState {
    /// Builds the state with the deterministic mock work source.
    pub fn initialize(config: Config) -> Arc<Self> {
        Self::with_work_source(config, Arc::new(MockWorkSource::new()))
    }

    /// Builds the state around an injected work source.
    pub fn with_work_source(config: Config, source: Arc<dyn WorkSource>) -> Arc<Self> {
        let jobs = JobRegistry::new(
            source,
            config.mining.initial_difficulty,
            config.mining.job_history,
        );
        let policy = IpPolicy::new(config.policy.clone());
        Arc::new(Self {
            config: Arc::new(config),
            connections: ConnectionRegistry::new(),
            jobs,
            stats: StatsState::new(),
            policy,
            session_seq: AtomicU64::new(0),
        })
    }

    /// Allocates the next session id, starting at 1. Returns `None` once
    /// [`MAX_SESSION_ID`] has been handed out, since ids are never reused.
    pub fn next_session_id(&self) -> Option<u64> {
        self.session_seq
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |seq| {
                (seq < MAX_SESSION_ID).then_some(seq + 1)
            })
            .ok()
            .map(|seq| seq + 1)
    }

    /// Moves the session counter so the next id handed out is `last + 1`.
    /// Ids already issued stay issued.
    pub fn skip_session_ids_to(&self, last: u64) {
        self.session_seq.fetch_max(last, Ordering::SeqCst);
    }

    /// Bans `ip` and asks every connection from it to close. Returns how many
    /// connections were signalled, or `None` if the address cannot be banned.
    pub fn ban_peer(&self, ip: IpAddr) -> Option<usize> {
        if !self.policy.ban(ip) {
            return None;
        }
        metrics::PEERS_BANNED_TOTAL.inc();
        Some(self.connections.kill_ip(ip))
    }
}
