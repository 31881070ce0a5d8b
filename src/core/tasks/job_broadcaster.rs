// src/core/tasks/job_broadcaster.rs

use crate::core::metrics;
use crate::core::protocol::Message;
use crate::core::state::{DeliveryReport, ServerState};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

/// What a single broadcast tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastOutcome {
    /// No miners were connected, so no job was minted.
    Idle,
    /// The work source failed; the tick was skipped and nothing was sent.
    Skipped,
    /// A fresh job was minted and offered to every registered connection.
    Delivered { job_id: String, report: DeliveryReport },
}

/// A task that periodically mints a fresh job and pushes it to every miner.
pub struct JobBroadcaster {
    state: Arc<ServerState>,
}

impl JobBroadcaster {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    /// Runs the broadcast loop until shutdown. The first tick fires one full
    /// interval after start.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let period = self.state.config.mining.broadcast_interval;
        info!("Job broadcaster started with a {:?} interval.", period);

        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                _ = shutdown_rx.recv() => {
                    info!("Job broadcaster shutting down.");
                    return;
                }
            }
        }
    }

    /// Performs one broadcast round.
    pub async fn tick(&self) -> BroadcastOutcome {
        if self.state.connections.is_empty() {
            debug!("No miners connected; skipping job broadcast.");
            return BroadcastOutcome::Idle;
        }

        let job = match self.state.jobs.mint().await {
            Ok(job) => job,
            Err(e) => {
                warn!("Failed to fetch work for broadcast: {}. Skipping this round.", e);
                metrics::WORK_FETCH_FAILURES_TOTAL.inc();
                return BroadcastOutcome::Skipped;
            }
        };

        self.state.stats.increment_jobs_broadcast();
        metrics::JOBS_BROADCAST_TOTAL.inc();
        let report = self
            .state
            .connections
            .broadcast(&Message::from(job.to_notification()));

        info!(
            "Broadcast job {} (height {}) to {} miners ({} skipped, {} removed).",
            job.id, job.height, report.delivered, report.skipped, report.removed
        );
        BroadcastOutcome::Delivered {
            job_id: job.id.clone(),
            report,
        }
    }
}
