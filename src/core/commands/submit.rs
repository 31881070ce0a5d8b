// src/core/commands/submit.rs

use super::command_trait::ParseCommand;
use super::helpers::param_to_string;
use crate::core::StratumError;
use crate::core::protocol::message::METHOD_SUBMIT;
use serde_json::Value;

/// The fewest params a submission can carry.
pub const MIN_SUBMIT_PARAMS: usize = 4;

/// `mining.submit`, accepted in two layouts:
///
/// - `[worker, job_id, extranonce2, nonce]`
/// - `[worker, job_id, extranonce2, ntime, nonce]`
///
/// The nonce is always the last param, whatever the length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submit {
    pub worker: String,
    pub job_id: String,
    pub extranonce2: String,
    pub ntime: Option<String>,
    pub nonce: String,
}

impl ParseCommand for Submit {
    fn parse(params: &[Value]) -> Result<Self, StratumError> {
        if params.len() < MIN_SUBMIT_PARAMS {
            return Err(StratumError::InvalidParams(METHOD_SUBMIT.to_string()));
        }
        let ntime = if params.len() > MIN_SUBMIT_PARAMS {
            Some(param_to_string(&params[3]))
        } else {
            None
        };
        Ok(Submit {
            worker: param_to_string(&params[0]),
            job_id: param_to_string(&params[1]),
            extranonce2: param_to_string(&params[2]),
            ntime,
            nonce: param_to_string(&params[params.len() - 1]),
        })
    }
}
