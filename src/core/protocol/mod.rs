// src/core/protocol/mod.rs

pub mod codec;
pub mod message;

pub use codec::{DEFAULT_MAX_LINE_LENGTH, Inbound, JsonLineCodec, StratumCodec};
pub use message::{Message, Notification, Request, Response, RpcError};
