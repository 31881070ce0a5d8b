// src/core/state/policy.rs

//! Per-address abuse policy: concurrent connection caps, temporary bans, and
//! the malformed-input and invalid-share limits that trigger them.

use crate::config::PolicyConfig;
use dashmap::DashMap;
use std::net::IpAddr;
use tokio::time::Instant;
use tracing::debug;

/// The result of asking the policy to admit a new connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Banned,
    /// The address already holds `max_connections_per_ip` connections.
    TooManyConnections,
}

/// Whether an address may keep talking after an offence was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyVerdict {
    Allowed,
    /// The address crossed a limit and should be banned.
    Banned,
}

#[derive(Debug, Default)]
struct IpRecord {
    connections: usize,
    malformed: u32,
    valid_shares: u32,
    invalid_shares: u32,
    banned_until: Option<Instant>,
}

impl IpRecord {
    /// Clears a ban that has run out. Offence counters start over with it.
    fn ban_active(&mut self, now: Instant) -> bool {
        match self.banned_until {
            Some(until) if now < until => true,
            Some(_) => {
                self.banned_until = None;
                self.malformed = 0;
                self.valid_shares = 0;
                self.invalid_shares = 0;
                false
            }
            None => false,
        }
    }
}

/// Tracks every address with a live connection, a pending offence count, or
/// an active ban.
#[derive(Debug)]
pub struct IpPolicy {
    config: PolicyConfig,
    records: DashMap<IpAddr, IpRecord>,
}

impl IpPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self {
            config,
            records: DashMap::new(),
        }
    }

    fn applies_to(&self, ip: IpAddr) -> bool {
        self.config.enabled && !self.config.trusted.contains(&ip)
    }

    /// Checks the ban list and the per-address cap, and counts the connection
    /// if it is admitted. Every admitted connection must be paired with a
    /// later [`release`](Self::release).
    pub fn admit(&self, ip: IpAddr) -> Admission {
        if !self.applies_to(ip) {
            return Admission::Admitted;
        }
        let mut record = self.records.entry(ip).or_default();
        if record.ban_active(Instant::now()) {
            return Admission::Banned;
        }
        if record.connections >= self.config.max_connections_per_ip {
            return Admission::TooManyConnections;
        }
        record.connections += 1;
        Admission::Admitted
    }

    /// Gives back a connection slot taken by [`admit`](Self::admit).
    pub fn release(&self, ip: IpAddr) {
        if let Some(mut record) = self.records.get_mut(&ip) {
            record.connections = record.connections.saturating_sub(1);
        }
    }

    pub fn is_banned(&self, ip: IpAddr) -> bool {
        if !self.applies_to(ip) {
            return false;
        }
        self.records
            .get_mut(&ip)
            .is_some_and(|mut record| record.ban_active(Instant::now()))
    }

    /// Bans `ip` for `ban_duration`. Returns false if the policy is off or the
    /// address is trusted.
    pub fn ban(&self, ip: IpAddr) -> bool {
        if !self.applies_to(ip) {
            return false;
        }
        let mut record = self.records.entry(ip).or_default();
        record.banned_until = Some(Instant::now() + self.config.ban_duration);
        record.malformed = 0;
        true
    }

    /// Counts one malformed or oversized line from `ip`.
    pub fn record_malformed(&self, ip: IpAddr) -> PolicyVerdict {
        if !self.applies_to(ip) {
            return PolicyVerdict::Allowed;
        }
        let mut record = self.records.entry(ip).or_default();
        record.malformed += 1;
        if record.malformed >= self.config.malformed_limit {
            PolicyVerdict::Banned
        } else {
            PolicyVerdict::Allowed
        }
    }

    /// Counts one share from `ip`. Every `share_check_threshold` shares the
    /// invalid ratio is checked against `invalid_share_percent` and the window
    /// starts over.
    pub fn record_share(&self, ip: IpAddr, accepted: bool) -> PolicyVerdict {
        if !self.applies_to(ip) {
            return PolicyVerdict::Allowed;
        }
        let mut record = self.records.entry(ip).or_default();
        if accepted {
            record.valid_shares += 1;
        } else {
            record.invalid_shares += 1;
        }
        if record.valid_shares + record.invalid_shares < self.config.share_check_threshold {
            return PolicyVerdict::Allowed;
        }

        let invalid_percent =
            record.invalid_shares as f64 / (record.valid_shares as f64 + 1.0) * 100.0;
        record.valid_shares = 0;
        record.invalid_shares = 0;
        if invalid_percent >= self.config.invalid_share_percent {
            PolicyVerdict::Banned
        } else {
            PolicyVerdict::Allowed
        }
    }

    /// Lifts expired bans and forgets addresses with no connection and no ban.
    /// Returns how many bans were lifted.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut lifted = 0;
        self.records.retain(|ip, record| {
            if record.banned_until.is_some() && !record.ban_active(now) {
                debug!("Ban expired for {}", ip);
                lifted += 1;
            }
            record.connections > 0 || record.banned_until.is_some()
        });
        lifted
    }

    pub fn banned_count(&self) -> usize {
        let now = Instant::now();
        self.records
            .iter()
            .filter(|record| record.banned_until.is_some_and(|until| now < until))
            .count()
    }

    /// Addresses currently tracked.
    pub fn tracked(&self) -> usize {
        self.records.len()
    }

    /// Connections currently counted against `ip`.
    pub fn connections_from(&self, ip: IpAddr) -> usize {
        self.records.get(&ip).map_or(0, |record| record.connections)
    }
}
