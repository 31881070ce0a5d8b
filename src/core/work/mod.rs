// src/core/work/mod.rs

//! Work distribution: the work source seam, immutable jobs, and the registry
//! that mints them.

mod job;
mod registry;
mod source;

pub use job::{Job, Share, WorkTemplate, job_id_for};
pub use registry::JobRegistry;
pub use source::{HEADER_HEX_LEN, MOCK_BASE_HEIGHT, MOCK_TARGET, MockWorkSource, WorkSource};
