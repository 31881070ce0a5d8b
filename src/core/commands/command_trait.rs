// src/core/commands/command_trait.rs

//! Defines the core trait for parsing request params into typed commands.

use crate::core::StratumError;
use serde_json::Value;

/// A trait for parsing a command's positional params into its struct form.
pub trait ParseCommand: Sized {
    fn parse(params: &[Value]) -> Result<Self, StratumError>;
}
