// src/core/errors.rs

//! Defines the primary error type for the entire server.

use crate::core::protocol::RpcError;
use std::sync::Arc;
use thiserror::Error;

/// JSON-RPC error codes sent back to miners.
pub mod codes {
    /// The submitted work could not be handed to the work source.
    pub const OTHER: i64 = 20;
    pub const JOB_NOT_FOUND: i64 = 21;
    pub const LOW_DIFFICULTY_SHARE: i64 = 23;
    pub const UNAUTHORIZED: i64 = 24;
    pub const INVALID_PARAMS: i64 = -1;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INTERNAL_ERROR: i64 = -32603;
    pub const PARSE_ERROR: i64 = -32700;
}

/// The main error enum, representing all possible failures within the server.
///
/// Transport errors end the connection they occurred on. Framing and protocol
/// errors are answered (or logged) and the connection keeps running.
#[derive(Error, Debug)]
pub enum StratumError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Malformed JSON line: {0}")]
    MalformedJson(String),

    #[error("Request exceeds the {limit} byte limit")]
    RequestTooLarge { limit: usize },

    #[error("Unknown method '{0}'")]
    UnknownMethod(String),

    #[error("Invalid params for '{0}'")]
    InvalidParams(String),

    #[error("Unauthorized worker")]
    Unauthorized,

    #[error("Job '{0}' not found")]
    JobNotFound(String),

    #[error("Share rejected for job '{0}'")]
    ShareRejected(String),

    #[error("Work source error: {0}")]
    WorkSource(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl StratumError {
    /// Converts the error into the `[code, message, null]` triple sent on the wire.
    pub fn to_rpc_error(&self) -> RpcError {
        let (code, message) = match self {
            StratumError::UnknownMethod(_) => (codes::METHOD_NOT_FOUND, "Method not found"),
            StratumError::InvalidParams(_) => (codes::INVALID_PARAMS, "Invalid params"),
            StratumError::RequestTooLarge { .. } => (codes::INVALID_REQUEST, "Request too large"),
            StratumError::MalformedJson(_) => (codes::PARSE_ERROR, "Parse error"),
            StratumError::Unauthorized => (codes::UNAUTHORIZED, "Unauthorized"),
            StratumError::JobNotFound(_) => (codes::JOB_NOT_FOUND, "Job not found"),
            StratumError::ShareRejected(_) => (codes::LOW_DIFFICULTY_SHARE, "Share rejected"),
            StratumError::WorkSource(_) => (codes::OTHER, "Work submission failed"),
            StratumError::Io(_) | StratumError::Internal(_) => {
                (codes::INTERNAL_ERROR, "Internal error")
            }
        };
        RpcError::new(code, message)
    }
}

// Manual implementation of Clone because `std::io::Error` is not cloneable.
impl Clone for StratumError {
    fn clone(&self) -> Self {
        match self {
            StratumError::Io(e) => StratumError::Io(Arc::clone(e)),
            StratumError::MalformedJson(s) => StratumError::MalformedJson(s.clone()),
            StratumError::RequestTooLarge { limit } => {
                StratumError::RequestTooLarge { limit: *limit }
            }
            StratumError::UnknownMethod(s) => StratumError::UnknownMethod(s.clone()),
            StratumError::InvalidParams(s) => StratumError::InvalidParams(s.clone()),
            StratumError::Unauthorized => StratumError::Unauthorized,
            StratumError::JobNotFound(s) => StratumError::JobNotFound(s.clone()),
            StratumError::ShareRejected(s) => StratumError::ShareRejected(s.clone()),
            StratumError::WorkSource(s) => StratumError::WorkSource(s.clone()),
            StratumError::Internal(s) => StratumError::Internal(s.clone()),
        }
    }
}

impl PartialEq for StratumError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (StratumError::Io(e1), StratumError::Io(e2)) => e1.kind() == e2.kind(),
            (StratumError::MalformedJson(s1), StratumError::MalformedJson(s2)) => s1 == s2,
            (
                StratumError::RequestTooLarge { limit: l1 },
                StratumError::RequestTooLarge { limit: l2 },
            ) => l1 == l2,
            (StratumError::UnknownMethod(s1), StratumError::UnknownMethod(s2)) => s1 == s2,
            (StratumError::InvalidParams(s1), StratumError::InvalidParams(s2)) => s1 == s2,
            (StratumError::JobNotFound(s1), StratumError::JobNotFound(s2)) => s1 == s2,
            (StratumError::ShareRejected(s1), StratumError::ShareRejected(s2)) => s1 == s2,
            (StratumError::WorkSource(s1), StratumError::WorkSource(s2)) => s1 == s2,
            (StratumError::Internal(s1), StratumError::Internal(s2)) => s1 == s2,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for StratumError {
    fn from(e: std::io::Error) -> Self {
        StratumError::Io(Arc::new(e))
    }
}

impl From<serde_json::Error> for StratumError {
    fn from(e: serde_json::Error) -> Self {
        StratumError::MalformedJson(e.to_string())
    }
}
