// src/core/work/job.rs

//! Immutable units of work and the shares miners return for them.

use crate::core::protocol::Notification;
use crate::core::protocol::message::METHOD_NOTIFY;
use serde_json::Value;

/// Formats the wire id for the `seq`-th job, e.g. `job_000042`.
pub fn job_id_for(seq: u64) -> String {
    format!("job_{seq:06}")
}

/// Raw work handed out by a [`WorkSource`](super::WorkSource).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkTemplate {
    /// Hex-encoded header blob the miner hashes.
    pub header: String,
    /// Hex-encoded 256-bit target.
    pub target: String,
    pub height: u64,
}

/// A job as announced to miners. Never mutated after it is minted; a newer
/// job supersedes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: String,
    /// The registry sequence number the id was derived from.
    pub seq: u64,
    pub header: String,
    pub target: String,
    pub height: u64,
    pub clean_jobs: bool,
}

impl Job {
    pub fn from_template(seq: u64, template: WorkTemplate) -> Self {
        Self {
            id: job_id_for(seq),
            seq,
            header: template.header,
            target: template.target,
            height: template.height,
            clean_jobs: true,
        }
    }

    /// Builds the `mining.notify` push:
    /// `[jobId, header, target, height, cleanJobs]`.
    pub fn to_notification(&self) -> Notification {
        Notification::new(
            METHOD_NOTIFY,
            vec![
                Value::from(self.id.clone()),
                Value::from(self.header.clone()),
                Value::from(self.target.clone()),
                Value::from(self.height),
                Value::from(self.clean_jobs),
            ],
        )
    }
}

/// A solution submitted by a miner via `mining.submit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Share {
    pub session_id: u64,
    pub address: String,
    pub worker: String,
    pub job_id: String,
    pub extranonce1: String,
    pub extranonce2: String,
    /// Only present in the five-field submit form.
    pub ntime: Option<String>,
    pub nonce: String,
    pub difficulty: u64,
}
