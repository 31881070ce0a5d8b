// src/core/commands/authorize.rs

use super::command_trait::ParseCommand;
use super::helpers::string_param;
use crate::connection::parse_worker_id;
use crate::core::StratumError;
use crate::core::protocol::message::METHOD_AUTHORIZE;
use serde_json::Value;

/// `mining.authorize [address.worker, password?]`
///
/// The password is ignored; any well-formed login is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorize {
    pub username: String,
    pub address: String,
    pub worker: String,
}

impl ParseCommand for Authorize {
    fn parse(params: &[Value]) -> Result<Self, StratumError> {
        let username = string_param(params, 0)
            .ok_or_else(|| StratumError::InvalidParams(METHOD_AUTHORIZE.to_string()))?;
        let (address, worker) = parse_worker_id(username);
        Ok(Authorize {
            username: username.to_string(),
            address,
            worker,
        })
    }
}
