// src/core/commands/mod.rs

//! Defines the supported Stratum methods and the closed `Command` enum that
//! every inbound request is parsed into before dispatch.

pub mod authorize;
pub mod command_trait;
pub mod helpers;
pub mod submit;
pub mod subscribe;

pub use authorize::Authorize;
pub use command_trait::ParseCommand;
pub use submit::Submit;
pub use subscribe::Subscribe;

use crate::core::StratumError;
use crate::core::protocol::Request;
use crate::core::protocol::message::{
    METHOD_AUTHORIZE, METHOD_EXTRANONCE_SUBSCRIBE, METHOD_PING, METHOD_SUBMIT, METHOD_SUBSCRIBE,
};

/// A parsed request. Unrecognized methods parse successfully into `Unknown`
/// so the router can answer them with `-32601`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Subscribe(Subscribe),
    Authorize(Authorize),
    Submit(Submit),
    Ping,
    ExtranonceSubscribe,
    Unknown(String),
}

impl Command {
    /// The method name, or `unknown` for unrecognized methods. Used as a
    /// metrics label, so it never echoes client input.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Subscribe(_) => METHOD_SUBSCRIBE,
            Command::Authorize(_) => METHOD_AUTHORIZE,
            Command::Submit(_) => METHOD_SUBMIT,
            Command::Ping => METHOD_PING,
            Command::ExtranonceSubscribe => METHOD_EXTRANONCE_SUBSCRIBE,
            Command::Unknown(_) => "unknown",
        }
    }
}

impl TryFrom<&Request> for Command {
    type Error = StratumError;

    fn try_from(request: &Request) -> Result<Self, Self::Error> {
        // Params are only checked for the methods that read them.
        Ok(match request.method.as_str() {
            METHOD_SUBSCRIBE => Command::Subscribe(Subscribe::parse(request.params()?)?),
            METHOD_AUTHORIZE => Command::Authorize(Authorize::parse(request.params()?)?),
            METHOD_SUBMIT => Command::Submit(Submit::parse(request.params()?)?),
            METHOD_PING => Command::Ping,
            METHOD_EXTRANONCE_SUBSCRIBE => Command::ExtranonceSubscribe,
            other => Command::Unknown(other.to_string()),
        })
    }
}
