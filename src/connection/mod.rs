// src/connection/mod.rs

//! Manages the lifecycle of a single miner TCP connection, including line
//! framing, command routing, and session state management.

mod guard;
mod handler;
mod session;

pub use guard::ConnectionGuard;
pub use handler::{ConnectionHandler, is_normal_disconnect};
pub use session::{
    DEFAULT_WORKER_NAME, SessionSnapshot, SessionState, extranonce1_for, parse_worker_id,
};
