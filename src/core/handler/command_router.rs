// src/core/handler/command_router.rs

//! The central component for routing parsed commands to their handlers.
//!
//! The `Router` is the session state machine: it applies a `Command` to the
//! connection's `SessionState`, consults the shared job registry, and returns
//! the reply plus any pushes that must follow it on the same connection.

use crate::config::SubmitPolicy;
use crate::connection::SessionState;
use crate::core::commands::{Authorize, Command, Submit, Subscribe};
use crate::core::metrics;
use crate::core::protocol::Notification;
use crate::core::protocol::message::{METHOD_NOTIFY, METHOD_SET_DIFFICULTY};
use crate::core::state::ServerState;
use crate::core::work::Share;
use crate::core::StratumError;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a successful command produces: the `result` for the reply, and
/// notifications to write right after the reply, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteResponse {
    pub result: Value,
    pub pushes: Vec<Notification>,
}

impl RouteResponse {
    pub fn result(result: impl Into<Value>) -> Self {
        Self {
            result: result.into(),
            pushes: Vec::new(),
        }
    }

    pub fn with_pushes(result: impl Into<Value>, pushes: Vec<Notification>) -> Self {
        Self {
            result: result.into(),
            pushes,
        }
    }
}

/// Applies commands to one session.
pub struct Router<'a> {
    state: Arc<ServerState>,
    session: &'a mut SessionState,
}

impl<'a> Router<'a> {
    /// Creates a new `Router` for a given session.
    pub fn new(state: Arc<ServerState>, session: &'a mut SessionState) -> Self {
        Self { state, session }
    }

    /// The main entry point for routing a command.
    pub async fn route(&mut self, command: Command) -> Result<RouteResponse, StratumError> {
        let timer = metrics::REQUEST_LATENCY_SECONDS.start_timer();
        metrics::REQUESTS_PROCESSED_TOTAL
            .with_label_values(&[command.name()])
            .inc();

        let response = match command {
            Command::Subscribe(cmd) => Ok(self.subscribe(cmd)),
            Command::Authorize(cmd) => Ok(self.authorize(cmd).await),
            Command::Submit(cmd) => self.submit(cmd).await,
            Command::Ping => Ok(RouteResponse::result("pong")),
            Command::ExtranonceSubscribe => Ok(RouteResponse::result(true)),
            Command::Unknown(method) => {
                debug!("Session {}: unknown method '{}'", self.session.id, method);
                Err(StratumError::UnknownMethod(method))
            }
        };
        timer.observe_duration();
        response
    }

    /// Handles `mining.subscribe`: hands out the extranonce and announces the
    /// current difficulty.
    fn subscribe(&mut self, cmd: Subscribe) -> RouteResponse {
        if let Some(software) = &cmd.miner_software {
            debug!("Session {}: miner software {}", self.session.id, software);
        }
        self.session.mark_subscribed(cmd.miner_software);
        self.session.difficulty = self.state.jobs.difficulty();

        let subscription_id = self.session.id.to_string();
        let result = json!([
            [
                [METHOD_NOTIFY, subscription_id],
                [METHOD_SET_DIFFICULTY, subscription_id]
            ],
            self.session.extranonce1,
            self.session.extranonce2_size
        ]);
        RouteResponse::with_pushes(
            result,
            vec![Notification::set_difficulty(self.session.difficulty)],
        )
    }

    /// Handles `mining.authorize`: records the worker and sends this miner a
    /// job of its own, so it does not wait for the next broadcast.
    async fn authorize(&mut self, cmd: Authorize) -> RouteResponse {
        info!(
            "Session {} authorized: {}.{}",
            self.session.id, cmd.address, cmd.worker
        );
        self.session.authorize(cmd.address, cmd.worker);

        let job = match self.state.jobs.mint_for_session().await {
            Ok(job) => Some(job),
            Err(e) => {
                warn!(
                    "Session {}: could not mint a job on authorize: {}. Falling back to the current job.",
                    self.session.id, e
                );
                metrics::WORK_FETCH_FAILURES_TOTAL.inc();
                self.state.jobs.current()
            }
        };
        let pushes = job.iter().map(|job| job.to_notification()).collect();
        if job.is_some() {
            self.session.assigned_job = job;
        }
        RouteResponse::with_pushes(true, pushes)
    }

    /// Handles `mining.submit` under the configured policy and relays the
    /// work source's verdict.
    async fn submit(&mut self, cmd: Submit) -> Result<RouteResponse, StratumError> {
        debug!(
            "Session {}: share for job {} (nonce {}, {} format)",
            self.session.id,
            cmd.job_id,
            cmd.nonce,
            if cmd.ntime.is_some() { "standard" } else { "compact" }
        );

        if self.state.config.mining.submit_policy == SubmitPolicy::Strict {
            if !self.session.is_authorized() {
                self.record_share(false);
                return Err(StratumError::Unauthorized);
            }
            if !self.is_known_job(&cmd.job_id) {
                self.record_share(false);
                return Err(StratumError::JobNotFound(cmd.job_id));
            }
        }

        let share = Share {
            session_id: self.session.id,
            address: self.session.worker_address.clone(),
            worker: cmd.worker,
            job_id: cmd.job_id,
            extranonce1: self.session.extranonce1.clone(),
            extranonce2: cmd.extranonce2,
            ntime: cmd.ntime,
            nonce: cmd.nonce,
            difficulty: self.session.difficulty,
        };

        match self.state.jobs.submit(&share).await {
            Ok(true) => {
                self.record_share(true);
                Ok(RouteResponse::result(true))
            }
            Ok(false) => {
                self.record_share(false);
                Err(StratumError::ShareRejected(share.job_id))
            }
            Err(e) => {
                warn!(
                    "Session {}: work submission for job {} failed: {}",
                    self.session.id, share.job_id, e
                );
                self.record_share(false);
                Err(StratumError::WorkSource(e.to_string()))
            }
        }
    }

    /// A job id is known if it is a recent broadcast job, or the job this
    /// session was handed on authorize and no broadcast has outlived it.
    fn is_known_job(&self, job_id: &str) -> bool {
        let jobs = &self.state.jobs;
        let own_job = self
            .session
            .assigned_job
            .as_ref()
            .is_some_and(|job| job.id == job_id && jobs.is_live(job));
        own_job || jobs.is_known(job_id)
    }

    fn record_share(&mut self, accepted: bool) {
        self.session.record_share(accepted);
        self.state.stats.record_share(accepted);
        let label = if accepted { "accepted" } else { "rejected" };
        metrics::SHARES_TOTAL.with_label_values(&[label]).inc();
    }
}
