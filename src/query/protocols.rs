pub mod minecraft_udp;

use std::{fmt, io, num::ParseIntError};

use serde::Serialize;

use crate::net::Transport;

pub use minecraft_udp::{FullStat, MinecraftUdp};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Udp,
    Tcp,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Network::Udp => "udp",
            Network::Tcp => "tcp",
        })
    }
}

/// Which request a response was expected to answer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Step {
    Handshake,
    FullStat,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Handshake => "handshake",
            Step::FullStat => "full stat request",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error(transparent)]
    Transport(#[from] io::Error),
    #[error("sent a {step}, but got a response with type {got:#04x} instead of {expected:#04x}")]
    UnexpectedResponse { step: Step, expected: u8, got: u8 },
    #[error("received {step} response for wrong session id (expected {expected}, got {got})")]
    SessionMismatch { step: Step, expected: i32, got: i32 },
    #[error("invalid challenge token {token:?}")]
    InvalidChallengeToken {
        token: String,
        #[source]
        source: ParseIntError,
    },
    #[error("{step} response was cut off before the header ended")]
    Truncated { step: Step },
}

/// The decoded result of a successful query, one variant per protocol.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "protocol", rename_all = "snake_case")]
pub enum Response {
    MinecraftUdp(FullStat),
}

pub trait Protocol: Send + Sync {
    /// Names this protocol can be selected by, compared case-insensitively.
    fn names(&self) -> &'static [&'static str];
    fn default_port(&self) -> u16;
    /// When more than one protocol could be used for a target, the highest
    /// priority wins.
    fn priority(&self) -> u16;
    fn network(&self) -> Network;
    /// Run the whole exchange over an already bound transport.
    fn execute(&self, transport: &mut dyn Transport) -> Result<Response, QueryError>;
}

pub struct ProtocolRegistry {
    /// Sorted by priority, highest first. Ties keep registration order.
    protocols: Vec<Box<dyn Protocol>>,
}

impl Default for ProtocolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolRegistry {
    /// A registry with every built-in protocol.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(MinecraftUdp));
        registry
    }

    pub fn empty() -> Self {
        Self {
            protocols: Vec::new(),
        }
    }

    pub fn register(&mut self, protocol: Box<dyn Protocol>) {
        let index = self
            .protocols
            .partition_point(|p| p.priority() >= protocol.priority());
        self.protocols.insert(index, protocol);
    }

    pub fn by_name(&self, name: &str) -> Option<&dyn Protocol> {
        self.iter()
            .find(|p| p.names().iter().any(|n| n.eq_ignore_ascii_case(name)))
    }

    /// Every protocol that listens on `port` by default, highest priority
    /// first.
    pub fn by_port(&self, port: u16) -> impl Iterator<Item = &dyn Protocol> {
        self.iter().filter(move |p| p.default_port() == port)
    }

    pub fn preferred(&self) -> Option<&dyn Protocol> {
        self.iter().next()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Protocol> {
        self.protocols.iter().map(|p| p.as_ref() as &dyn Protocol)
    }
}
