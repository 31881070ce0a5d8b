// src/core/mod.rs

//! The central module containing the core logic and data structures of the
//! Stratum server.

pub mod commands;
pub mod errors;
pub mod handler;
pub mod metrics;
pub mod protocol;
pub mod state;
pub mod tasks;
pub mod work;

pub use commands::Command;
pub use errors::StratumError;
