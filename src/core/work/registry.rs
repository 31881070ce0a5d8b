// src/core/work/registry.rs

//! Process-wide job state: the current job, recent history, and difficulty.

use super::job::{Job, Share};
use super::source::WorkSource;
use crate::core::StratumError;
use crate::core::metrics;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Mints jobs from a [`WorkSource`] and remembers the most recent broadcast ones.
#[derive(Debug)]
pub struct JobRegistry {
    source: Arc<dyn WorkSource>,
    /// The sequence number of the last job handed out. Only ever increases.
    job_seq: AtomicU64,
    difficulty: u64,
    current: RwLock<Option<Arc<Job>>>,
    /// Sequence numbers and ids of recently broadcast jobs, oldest first.
    recent: Mutex<VecDeque<(u64, String)>>,
    history: usize,
}

impl JobRegistry {
    pub fn new(source: Arc<dyn WorkSource>, difficulty: u64, history: usize) -> Self {
        Self {
            source,
            job_seq: AtomicU64::new(0),
            difficulty,
            current: RwLock::new(None),
            recent: Mutex::new(VecDeque::with_capacity(history)),
            history: history.max(1),
        }
    }

    /// Mints a job for every connection and adds it to the broadcast history.
    pub async fn mint(&self) -> Result<Arc<Job>, StratumError> {
        let job = self.draw().await?;

        let mut recent = self.recent.lock();
        if recent.len() == self.history {
            recent.pop_front();
        }
        recent.push_back((job.seq, job.id.clone()));
        Ok(job)
    }

    /// Mints a job addressed to a single miner. It becomes the current job but
    /// stays out of the broadcast history, so logins never push a broadcast
    /// job out of it. The session that received it tracks it instead.
    pub async fn mint_for_session(&self) -> Result<Arc<Job>, StratumError> {
        self.draw().await
    }

    /// Draws a template with a strictly greater sequence number than any
    /// before it.
    ///
    /// A failed fetch leaves the current job in place. The consumed sequence
    /// number is not reused, so ids may skip but never repeat.
    async fn draw(&self) -> Result<Arc<Job>, StratumError> {
        let seq = self.job_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let template = self.source.fetch_work(seq).await?;
        let job = Arc::new(Job::from_template(seq, template));

        {
            let mut current = self.current.write();
            // Two concurrent mints can finish out of order; keep the newest.
            if current.as_ref().is_none_or(|c| c.seq < job.seq) {
                *current = Some(job.clone());
            }
        }

        metrics::CURRENT_JOB_HEIGHT.set(job.height as f64);
        debug!("Minted job {} at height {}", job.id, job.height);
        Ok(job)
    }

    /// The newest job minted so far, if any.
    pub fn current(&self) -> Option<Arc<Job>> {
        self.current.read().clone()
    }

    /// True if `job_id` is among the last `history` broadcast jobs.
    pub fn is_known(&self, job_id: &str) -> bool {
        self.recent.lock().iter().any(|(_, id)| id == job_id)
    }

    /// True unless `job` is older than every broadcast job still remembered.
    pub fn is_live(&self, job: &Job) -> bool {
        let recent = self.recent.lock();
        recent.len() < self.history || recent.front().is_none_or(|(seq, _)| job.seq >= *seq)
    }

    pub fn difficulty(&self) -> u64 {
        self.difficulty
    }

    /// The sequence number of the last job handed out (0 if none).
    pub fn last_seq(&self) -> u64 {
        self.job_seq.load(Ordering::SeqCst)
    }

    /// Forwards a share to the work source.
    pub async fn submit(&self, share: &Share) -> Result<bool, StratumError> {
        self.source.submit_work(share).await
    }
}
