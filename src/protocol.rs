//! # Broker Line Protocol
//!
//! Every message is a single line of UTF-8 text terminated by `\n`.
//! Clients send commands and the broker answers each one with exactly one
//! response line before reading the next command:
//!
//! | Command        | Response                         |
//! |----------------|----------------------------------|
//! | `PUSH <token>` | `OK`                             |
//! | `PULL`         | `MSG <token>` or `EMPTY`         |
//! | anything else  | `ERR unknown command`            |
//!
//! Tokens are opaque to the broker. In practice they carry a nanosecond
//! timestamp, but nothing here interprets them.

use std::fmt;
use thiserror::Error;

const PUSH_PREFIX: &str = "PUSH ";
const PULL: &str = "PULL";
const MSG_PREFIX: &str = "MSG ";
const OK: &str = "OK";
const EMPTY: &str = "EMPTY";
const ERR_PREFIX: &str = "ERR ";

/// Reason text sent back for commands the broker does not understand
pub const UNKNOWN_COMMAND: &str = "unknown command";

/// Errors produced while decoding protocol lines
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The client sent a line that is not a known command
    #[error("unknown command: {0:?}")]
    UnknownCommand(String),

    /// The broker sent a line that is not a known response
    #[error("unexpected response: {0:?}")]
    UnexpectedResponse(String),

    /// A token would break line framing
    #[error("token must not contain a newline")]
    NewlineInToken,
}

/// A client request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Append a token to the tail of the queue
    Push(String),
    /// Remove and return the head of the queue
    Pull,
}

impl Command {
    /// Decode one received line into a command.
    ///
    /// Surrounding whitespace, including a trailing `\r\n`, is ignored.
    /// The token of a `PUSH` is everything after the `PUSH ` prefix, inner
    /// spaces included.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim();
        if line == PULL {
            return Ok(Command::Pull);
        }
        match line.strip_prefix(PUSH_PREFIX) {
            Some(token) => Ok(Command::Push(token.to_string())),
            None => Err(ProtocolError::UnknownCommand(line.to_string())),
        }
    }

    /// Build a push command, rejecting tokens that would break framing
    pub fn push(token: impl Into<String>) -> Result<Self, ProtocolError> {
        let token = token.into();
        if token.contains('\n') || token.contains('\r') {
            return Err(ProtocolError::NewlineInToken);
        }
        Ok(Command::Push(token))
    }

    /// Encode as a terminated line ready to write to the socket
    pub fn to_line(&self) -> String {
        format!("{}\n", self)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Push(token) => write!(f, "{}{}", PUSH_PREFIX, token),
            Command::Pull => write!(f, "{}", PULL),
        }
    }
}

/// A broker reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// The pushed token was queued
    Ok,
    /// The head token, now removed from the queue
    Msg(String),
    /// The queue had nothing to pull
    Empty,
    /// The command was rejected
    Err(String),
}

impl Response {
    /// Reply for a line that did not decode
    pub fn unknown_command() -> Self {
        Response::Err(UNKNOWN_COMMAND.to_string())
    }

    /// Decode a line received from the broker
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim();
        if line == OK {
            Ok(Response::Ok)
        } else if line == EMPTY {
            Ok(Response::Empty)
        } else if let Some(token) = line.strip_prefix(MSG_PREFIX) {
            Ok(Response::Msg(token.to_string()))
        } else if let Some(reason) = line.strip_prefix(ERR_PREFIX) {
            Ok(Response::Err(reason.to_string()))
        } else {
            Err(ProtocolError::UnexpectedResponse(line.to_string()))
        }
    }

    /// Encode as a terminated line ready to write to the socket
    pub fn to_line(&self) -> String {
        format!("{}\n", self)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Ok => write!(f, "{}", OK),
            Response::Msg(token) => write!(f, "{}{}", MSG_PREFIX, token),
            Response::Empty => write!(f, "{}", EMPTY),
            Response::Err(reason) => write!(f, "{}{}", ERR_PREFIX, reason),
        }
    }
}
