// src/connection/session.rs

//! Defines the protocol state associated with a single miner session.

use crate::core::work::Job;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The worker name recorded when `mining.authorize` carries no `.worker` suffix.
pub const DEFAULT_WORKER_NAME: &str = "default";

/// Derives the eight-hex-digit extranonce1 for a session.
///
/// Session ids never exceed `MAX_SESSION_ID` and are never reused, so the
/// prefix is unique for the life of the server.
pub fn extranonce1_for(session_id: u64) -> String {
    format!("{:08x}", session_id)
}

/// Splits an `address.worker` login into its parts.
///
/// Only the first dot separates; an absent or empty worker part becomes
/// [`DEFAULT_WORKER_NAME`].
pub fn parse_worker_id(username: &str) -> (String, String) {
    match username.split_once('.') {
        Some((address, worker)) if !worker.is_empty() => (address.to_string(), worker.to_string()),
        Some((address, _)) => (address.to_string(), DEFAULT_WORKER_NAME.to_string()),
        None => (username.to_string(), DEFAULT_WORKER_NAME.to_string()),
    }
}

/// Holds the state specific to a single miner session.
///
/// `subscribed` and `authorized` only ever go from false to true.
#[derive(Debug)]
pub struct SessionState {
    pub id: u64,
    pub extranonce1: String,
    pub extranonce2_size: usize,
    subscribed: bool,
    authorized: bool,
    /// The payout address from the last successful `mining.authorize`.
    pub worker_address: String,
    pub worker_name: String,
    /// The difficulty announced to this miner.
    pub difficulty: u64,
    /// The user agent sent as the first `mining.subscribe` param, if any.
    pub miner_software: Option<String>,
    /// The job pushed to this miner alone on `mining.authorize`.
    pub assigned_job: Option<Arc<Job>>,
    pub connected_at: Instant,
    pub valid_shares: u64,
    pub invalid_shares: u64,
}

impl SessionState {
    /// Creates a fresh, unsubscribed session.
    pub fn new(id: u64, extranonce2_size: usize, difficulty: u64) -> Self {
        Self {
            id,
            extranonce1: extranonce1_for(id),
            extranonce2_size,
            subscribed: false,
            authorized: false,
            worker_address: String::new(),
            worker_name: String::new(),
            difficulty,
            miner_software: None,
            assigned_job: None,
            connected_at: Instant::now(),
            valid_shares: 0,
            invalid_shares: 0,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    pub fn is_authorized(&self) -> bool {
        self.authorized
    }

    /// Marks the session subscribed. Repeating it keeps the same extranonce.
    pub fn mark_subscribed(&mut self, miner_software: Option<String>) {
        self.subscribed = true;
        if miner_software.is_some() {
            self.miner_software = miner_software;
        }
    }

    /// Records the worker identity and marks the session authorized.
    pub fn authorize(&mut self, address: String, worker: String) {
        self.worker_address = address;
        self.worker_name = worker;
        self.authorized = true;
    }

    pub fn record_share(&mut self, accepted: bool) {
        if accepted {
            self.valid_shares += 1;
        } else {
            self.invalid_shares += 1;
        }
    }

    /// Captures a read-only copy for diagnostics.
    pub fn snapshot(&self, addr: SocketAddr) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            addr,
            extranonce1: self.extranonce1.clone(),
            subscribed: self.subscribed,
            authorized: self.authorized,
            worker_address: self.worker_address.clone(),
            worker_name: self.worker_name.clone(),
            difficulty: self.difficulty,
            miner_software: self.miner_software.clone(),
            connected_for: self.connected_at.elapsed(),
            valid_shares: self.valid_shares,
            invalid_shares: self.invalid_shares,
        }
    }
}

/// A point-in-time copy of a session, published to the connection registry.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub id: u64,
    pub addr: SocketAddr,
    pub extranonce1: String,
    pub subscribed: bool,
    pub authorized: bool,
    pub worker_address: String,
    pub worker_name: String,
    pub difficulty: u64,
    pub miner_software: Option<String>,
    pub connected_for: Duration,
    pub valid_shares: u64,
    pub invalid_shares: u64,
}
