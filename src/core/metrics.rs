// src/core/metrics.rs

//! Defines and registers Prometheus metrics for server monitoring.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only once
//! globally for the entire application lifecycle.

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, Histogram, TextEncoder, register_counter, register_counter_vec,
    register_gauge, register_histogram,
};

lazy_static! {
    // --- Server-wide Gauges ---
    /// The number of miners currently connected to the server.
    pub static ref CONNECTED_MINERS: Gauge =
        register_gauge!("stratumd_connected_miners", "Number of currently connected miners.").unwrap();
    /// The height of the newest job handed out.
    pub static ref CURRENT_JOB_HEIGHT: Gauge =
        register_gauge!("stratumd_current_job_height", "Height of the most recently minted job.").unwrap();

    // --- Server-wide Counters ---
    /// The total number of connections accepted by the server since startup.
    pub static ref CONNECTIONS_RECEIVED_TOTAL: Counter =
        register_counter!("stratumd_connections_received_total", "Total number of connections received.").unwrap();
    /// Connections closed immediately, labeled by reason (`max_clients`, `banned`, `per_ip_limit`, `session_ids_exhausted`).
    pub static ref CONNECTIONS_REJECTED_TOTAL: CounterVec =
        register_counter_vec!("stratumd_connections_rejected_total", "Total number of connections rejected on accept, labeled by reason.", &["reason"]).unwrap();
    /// Addresses banned by the abuse policy.
    pub static ref PEERS_BANNED_TOTAL: Counter =
        register_counter!("stratumd_peers_banned_total", "Total number of addresses banned by the abuse policy.").unwrap();
    /// Requests processed, labeled by method (`unknown` for unrecognized ones).
    pub static ref REQUESTS_PROCESSED_TOTAL: CounterVec =
        register_counter_vec!("stratumd_requests_processed_total", "Total number of requests processed, labeled by method.", &["method"]).unwrap();
    /// Lines that could not be decoded (bad JSON or over the size limit).
    pub static ref MALFORMED_LINES_TOTAL: Counter =
        register_counter!("stratumd_malformed_lines_total", "Total number of inbound lines that failed to decode.").unwrap();
    /// Shares submitted, labeled by outcome.
    pub static ref SHARES_TOTAL: CounterVec =
        register_counter_vec!("stratumd_shares_total", "Total number of submitted shares, labeled by result.", &["result"]).unwrap();
    /// Jobs pushed by the periodic broadcaster.
    pub static ref JOBS_BROADCAST_TOTAL: Counter =
        register_counter!("stratumd_jobs_broadcast_total", "Total number of jobs broadcast to all miners.").unwrap();
    /// Broadcast ticks skipped because the work source failed.
    pub static ref WORK_FETCH_FAILURES_TOTAL: Counter =
        register_counter!("stratumd_work_fetch_failures_total", "Total number of failed work fetches.").unwrap();

    // --- Histograms ---
    /// A histogram of request handling latencies.
    pub static ref REQUEST_LATENCY_SECONDS: Histogram =
        register_histogram!("stratumd_request_latency_seconds", "Latency of request processing in seconds.").unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap_or_default()
}
