// src/core/commands/subscribe.rs

use super::command_trait::ParseCommand;
use super::helpers::string_param;
use crate::core::StratumError;
use serde_json::Value;

/// `mining.subscribe [user_agent?, ...]`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subscribe {
    pub miner_software: Option<String>,
}

impl ParseCommand for Subscribe {
    fn parse(params: &[Value]) -> Result<Self, StratumError> {
        Ok(Subscribe {
            miner_software: string_param(params, 0).map(str::to_string),
        })
    }
}
