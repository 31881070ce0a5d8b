// src/core/protocol/message.rs

//! Wire-level message shapes for the line-delimited JSON-RPC dialect spoken by
//! Stratum miners.

use crate::core::StratumError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const METHOD_SUBSCRIBE: &str = "mining.subscribe";
pub const METHOD_AUTHORIZE: &str = "mining.authorize";
pub const METHOD_SUBMIT: &str = "mining.submit";
pub const METHOD_PING: &str = "mining.ping";
pub const METHOD_EXTRANONCE_SUBSCRIBE: &str = "mining.extranonce.subscribe";
pub const METHOD_NOTIFY: &str = "mining.notify";
pub const METHOD_SET_DIFFICULTY: &str = "mining.set_difficulty";

/// A single client-to-server request, one per line.
///
/// A missing `id` decodes as `null` and a missing `method` as the empty string,
/// which is then routed as an unknown method rather than rejected as malformed.
/// `params` is kept untyped so a request whose params are not an array still
/// decodes and can be answered with its own id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub method: String,
    #[serde(default = "empty_params", deserialize_with = "null_as_empty")]
    pub params: Value,
}

impl Request {
    pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params: Value::Array(params),
        }
    }

    /// The positional params. Anything other than an array is `InvalidParams`.
    pub fn params(&self) -> Result<&[Value], StratumError> {
        match &self.params {
            Value::Array(params) => Ok(params),
            other => Err(StratumError::InvalidParams(format!(
                "params must be an array, got {}",
                json_kind(other)
            ))),
        }
    }
}

/// The `[code, message, data]` error triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError(pub i64, pub String, pub Option<Value>);

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self(code, message.into(), None)
    }

    pub fn code(&self) -> i64 {
        self.0
    }

    pub fn message(&self) -> &str {
        &self.1
    }
}

/// A reply to a request. `result` and `error` are always serialized, using
/// `null` for whichever one is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: Value,
    pub result: Value,
    pub error: Option<RpcError>,
}

impl Response {
    pub fn result(id: Value, result: impl Into<Value>) -> Self {
        Self {
            id,
            result: result.into(),
            error: None,
        }
    }

    pub fn error(id: Value, error: RpcError) -> Self {
        Self {
            id,
            result: Value::Null,
            error: Some(error),
        }
    }
}

/// A server push: a request-shaped message whose `id` is always `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Value,
    pub method: String,
    pub params: Vec<Value>,
}

impl Notification {
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            id: Value::Null,
            method: method.into(),
            params,
        }
    }

    /// Builds a `mining.set_difficulty` push.
    pub fn set_difficulty(difficulty: u64) -> Self {
        Self::new(METHOD_SET_DIFFICULTY, vec![Value::from(difficulty)])
    }
}

/// Anything the server writes to a miner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Response(Response),
    Notification(Notification),
}

impl Message {
    /// The notification method, if this is a push.
    pub fn method(&self) -> Option<&str> {
        match self {
            Message::Response(_) => None,
            Message::Notification(n) => Some(&n.method),
        }
    }
}

impl From<Response> for Message {
    fn from(r: Response) -> Self {
        Message::Response(r)
    }
}

impl From<Notification> for Message {
    fn from(n: Notification) -> Self {
        Message::Notification(n)
    }
}

fn empty_params() -> Value {
    Value::Array(Vec::new())
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Value, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => empty_params(),
        other => other,
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
