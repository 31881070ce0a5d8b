// src/core/work/source.rs

//! The seam to the chain node that supplies work and judges solutions.

use super::job::{Share, WorkTemplate, job_id_for};
use crate::core::StratumError;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fmt::Debug;

/// Length of a header blob in hex characters (112 bytes).
pub const HEADER_HEX_LEN: usize = 224;
/// Fixed target handed out by the mock source (32 bytes, 64 hex characters).
pub const MOCK_TARGET: &str = "00000000000000ffff0000000000000000000000000000000000000000000000";
/// Height of the chain before the first minted job.
pub const MOCK_BASE_HEIGHT: u64 = 1_000_000;

/// A remote, possibly slow and fallible, provider of work.
///
/// The server never validates proof-of-work itself; it forwards every share
/// to `submit_work` and relays the verdict.
#[async_trait]
pub trait WorkSource: Send + Sync + Debug {
    /// Fetches the work for the `job_seq`-th job. Sources backed by a real
    /// node may ignore the sequence number.
    async fn fetch_work(&self, job_seq: u64) -> Result<WorkTemplate, StratumError>;

    /// Submits a share. `Ok(false)` means the source rejected it.
    async fn submit_work(&self, share: &Share) -> Result<bool, StratumError>;
}

/// Deterministic work derived from the job sequence. Accepts every share.
#[derive(Debug, Default, Clone)]
pub struct MockWorkSource;

impl MockWorkSource {
    pub fn new() -> Self {
        Self
    }

    /// Builds the header for a job: the SHA-256 of `header_<job id>`, hex
    /// encoded and repeated out to the fixed header length.
    pub fn header_for(job_seq: u64) -> String {
        let digest = Sha256::digest(format!("header_{}", job_id_for(job_seq)).as_bytes());
        let hex = hex::encode(digest);
        let mut header = hex.repeat(HEADER_HEX_LEN.div_ceil(hex.len()));
        header.truncate(HEADER_HEX_LEN);
        header
    }
}

#[async_trait]
impl WorkSource for MockWorkSource {
    async fn fetch_work(&self, job_seq: u64) -> Result<WorkTemplate, StratumError> {
        Ok(WorkTemplate {
            header: Self::header_for(job_seq),
            target: MOCK_TARGET.to_string(),
            height: MOCK_BASE_HEIGHT + job_seq,
        })
    }

    async fn submit_work(&self, _share: &Share) -> Result<bool, StratumError> {
        Ok(true)
    }
}
