// src/core/state/mod.rs

//! Defines the central `ServerState` struct and all related state components.

mod connections;
mod core;
mod policy;
mod stats;

pub use connections::{
    ConnectionEntry, ConnectionRegistry, DeliveryReport, OUTBOUND_QUEUE_CAPACITY, ShutdownSender,
};
pub use core::{MAX_SESSION_ID, ServerState};
pub use policy::{Admission, IpPolicy, PolicyVerdict};
pub use stats::StatsState;
