// src/core/tasks/mod.rs

//! This module contains the long-running background tasks that drive the
//! server independently of miner traffic.

pub mod job_broadcaster;
pub mod policy_sweeper;
