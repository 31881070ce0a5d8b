// src/core/tasks/policy_sweeper.rs

use crate::core::state::ServerState;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info};

/// A task that lifts expired bans and forgets idle addresses.
pub struct PolicySweeper {
    state: Arc<ServerState>,
}

impl PolicySweeper {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let period = self.state.config.policy.reset_interval;
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.sweep();
                }
                _ = shutdown_rx.recv() => {
                    info!("Policy sweeper shutting down.");
                    return;
                }
            }
        }
    }

    /// Runs one sweep and returns how many bans were lifted.
    pub fn sweep(&self) -> usize {
        let policy = &self.state.policy;
        let lifted = policy.sweep();
        if lifted > 0 {
            info!("Lifted {} expired ban(s).", lifted);
        }
        debug!(
            "Policy sweep done: {} address(es) tracked, {} banned.",
            policy.tracked(),
            policy.banned_count()
        );
        lifted
    }
}
