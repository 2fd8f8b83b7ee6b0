// src/query/protocol.rs
//! Interface to the game query protocol. The wire format lives behind
//! [`ProtocolClient`]; this crate only consumes its outcomes.

use std::fmt;
use async_trait::async_trait;

/// Full statistics returned by a successful probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stat {
    pub motd: String,
    pub version: String,
    pub game_type: String,
    pub game_id: String,
    pub server_mod: String,
    pub map: String,
    pub plugins: String,
    pub max_players: i32,
    pub num_players: i32,
    pub players: Vec<String>,
}

/// Failure to open a connection to the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectError {
    pub message: String,
}

impl ConnectError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    /// Fatal errors mean the address can never succeed; anything else is transient.
    pub fn is_fatal(&self, signatures: &[String]) -> bool {
        signatures
            .iter()
            .any(|signature| !signature.is_empty() && self.message.contains(signature.as_str()))
    }
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connect failed: {}", self.message)
    }
}

impl std::error::Error for ConnectError {}

/// Failure after a connection was established. Always transient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
    pub message: String,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "full stat failed: {}", self.message)
    }
}

impl std::error::Error for QueryError {}

#[async_trait]
pub trait Connection: Send {
    async fn full_stat(&mut self) -> Result<Stat, QueryError>;
}

#[async_trait]
pub trait ProtocolClient: Send + Sync {
    async fn connect(&self, address: &str) -> Result<Box<dyn Connection>, ConnectError>;
}

/// Stand-in used when no protocol adapter is linked into the binary.
/// Every target reports as unreachable.
pub struct UnconfiguredProtocol;

#[async_trait]
impl ProtocolClient for UnconfiguredProtocol {
    async fn connect(&self, _address: &str) -> Result<Box<dyn Connection>, ConnectError> {
        Err(ConnectError::new("no query protocol adapter configured"))
    }
}
