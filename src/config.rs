// src/config.rs

//! Manages server configuration: loading from TOML, defaults, and validation.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::IpAddr;
use std::time::Duration;
use tracing::warn;

/// How `mining.submit` treats sessions and job ids before handing a share to
/// the work source.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubmitPolicy {
    /// Accept well-formed submissions regardless of session state or job id.
    #[default]
    Lenient,
    /// Require an authorized session and a job id from the recent job history.
    Strict,
}

/// Settings for work distribution and the per-connection protocol.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MiningConfig {
    /// How often a fresh job is minted and pushed to every connection.
    #[serde(with = "humantime_serde", default = "default_broadcast_interval")]
    pub broadcast_interval: Duration,
    /// The difficulty announced via `mining.set_difficulty` on subscribe.
    #[serde(default = "default_initial_difficulty")]
    pub initial_difficulty: u64,
    /// The number of bytes of nonce space left to the miner.
    #[serde(default = "default_extranonce2_size")]
    pub extranonce2_size: usize,
    /// A connection with no inbound traffic for this long is closed.
    #[serde(with = "humantime_serde", default = "default_idle_timeout")]
    pub idle_timeout: Duration,
    /// Lines longer than this many bytes are rejected with `-32600`.
    #[serde(default = "default_max_request_size")]
    pub max_request_size: usize,
    #[serde(default)]
    pub submit_policy: SubmitPolicy,
    /// How many recently broadcast job ids count as "known" under the strict policy.
    #[serde(default = "default_job_history")]
    pub job_history: usize,
}

fn default_broadcast_interval() -> Duration {
    Duration::from_secs(30)
}
fn default_initial_difficulty() -> u64 {
    1_000_000
}
fn default_extranonce2_size() -> usize {
    4
}
fn default_idle_timeout() -> Duration {
    Duration::from_secs(300) // 5 minutes
}
fn default_max_request_size() -> usize {
    1024
}
fn default_job_history() -> usize {
    8
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            broadcast_interval: default_broadcast_interval(),
            initial_difficulty: default_initial_difficulty(),
            extranonce2_size: default_extranonce2_size(),
            idle_timeout: default_idle_timeout(),
            max_request_size: default_max_request_size(),
            submit_policy: SubmitPolicy::default(),
            job_history: default_job_history(),
        }
    }
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MetricsConfig {
    /// If true, an HTTP server will be started to expose Prometheus metrics.
    #[serde(default)]
    pub enabled: bool,
    /// The port for the Prometheus metrics server.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_metrics_port() -> u16 {
    9100
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

/// Per-IP abuse policy: bans, connection caps, and malformed-input limits.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PolicyConfig {
    /// If false, no address is ever limited or banned.
    #[serde(default = "default_policy_enabled")]
    pub enabled: bool,
    /// Concurrent connections allowed from one address.
    #[serde(default = "default_max_connections_per_ip")]
    pub max_connections_per_ip: usize,
    /// Malformed or oversized lines an address may send before it is banned.
    #[serde(default = "default_malformed_limit")]
    pub malformed_limit: u32,
    /// Shares from one address needed before its invalid ratio is checked.
    #[serde(default = "default_share_check_threshold")]
    pub share_check_threshold: u32,
    /// Invalid shares per valid share, as a percentage, that triggers a ban.
    #[serde(default = "default_invalid_share_percent")]
    pub invalid_share_percent: f64,
    #[serde(with = "humantime_serde", default = "default_ban_duration")]
    pub ban_duration: Duration,
    /// How often expired bans and idle addresses are swept.
    #[serde(with = "humantime_serde", default = "default_reset_interval")]
    pub reset_interval: Duration,
    /// Addresses exempt from every limit.
    #[serde(default)]
    pub trusted: Vec<IpAddr>,
}

fn default_policy_enabled() -> bool {
    true
}
fn default_max_connections_per_ip() -> usize {
    32
}
fn default_malformed_limit() -> u32 {
    5
}
fn default_share_check_threshold() -> u32 {
    100
}
fn default_invalid_share_percent() -> f64 {
    50.0
}
fn default_ban_duration() -> Duration {
    Duration::from_secs(30 * 60)
}
fn default_reset_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            enabled: default_policy_enabled(),
            max_connections_per_ip: default_max_connections_per_ip(),
            malformed_limit: default_malformed_limit(),
            share_check_threshold: default_share_check_threshold(),
            invalid_share_percent: default_invalid_share_percent(),
            ban_duration: default_ban_duration(),
            reset_interval: default_reset_interval(),
            trusted: Vec::new(),
        }
    }
}

/// The complete server configuration.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
    #[serde(default)]
    pub mining: MiningConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3333
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_clients() -> usize {
    1024
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            max_clients: default_max_clients(),
            mining: MiningConfig::default(),
            metrics: MetricsConfig::default(),
            policy: PolicyConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid configuration in '{path}'"))
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration to ensure logical consistency.
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.max_clients == 0 {
            return Err(anyhow!("max_clients cannot be 0"));
        }

        let mining = &self.mining;
        if mining.broadcast_interval.is_zero() {
            return Err(anyhow!("mining.broadcast_interval cannot be 0"));
        }
        if mining.idle_timeout.is_zero() {
            return Err(anyhow!("mining.idle_timeout cannot be 0"));
        }
        if mining.initial_difficulty == 0 {
            return Err(anyhow!("mining.initial_difficulty cannot be 0"));
        }
        if !(1..=16).contains(&mining.extranonce2_size) {
            return Err(anyhow!(
                "mining.extranonce2_size must be between 1 and 16, got {}",
                mining.extranonce2_size
            ));
        }
        if mining.max_request_size < 64 {
            return Err(anyhow!("mining.max_request_size must be at least 64 bytes"));
        }
        if mining.job_history == 0 {
            return Err(anyhow!("mining.job_history cannot be 0"));
        }
        if mining.idle_timeout < mining.broadcast_interval {
            warn!(
                "mining.idle_timeout ({:?}) is shorter than mining.broadcast_interval ({:?}); quiet miners will be dropped between jobs.",
                mining.idle_timeout, mining.broadcast_interval
            );
        }

        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(anyhow!("metrics.port cannot be 0"));
            }
            if self.metrics.port == self.port {
                return Err(anyhow!(
                    "metrics.port cannot be the same as the stratum port"
                ));
            }
        }

        let policy = &self.policy;
        if policy.enabled {
            if policy.max_connections_per_ip == 0 {
                return Err(anyhow!("policy.max_connections_per_ip cannot be 0"));
            }
            if policy.malformed_limit == 0 {
                return Err(anyhow!("policy.malformed_limit cannot be 0"));
            }
            if policy.share_check_threshold == 0 {
                return Err(anyhow!("policy.share_check_threshold cannot be 0"));
            }
            if !(policy.invalid_share_percent > 0.0) {
                return Err(anyhow!("policy.invalid_share_percent must be positive"));
            }
            if policy.ban_duration.is_zero() || policy.reset_interval.is_zero() {
                return Err(anyhow!(
                    "policy.ban_duration and policy.reset_interval cannot be 0"
                ));
            }
            if policy.max_connections_per_ip > self.max_clients {
                warn!(
                    "policy.max_connections_per_ip ({}) exceeds max_clients ({}); one address can fill the server.",
                    policy.max_connections_per_ip, self.max_clients
                );
            }
        }
        Ok(())
    }
}
