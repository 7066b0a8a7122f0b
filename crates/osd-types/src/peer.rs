use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Numeric identity of a participant (daemon or client).
///
/// A daemon's own identity is its `whoami`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub u32);

impl PeerId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer.{}", self.0)
    }
}

impl From<u32> for PeerId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Destination of a message: a peer identity plus the port on that peer.
///
/// Replies are correlated to requests solely by this pair; there is no
/// request id on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerAddr {
    pub peer: PeerId,
    pub port: u32,
}

impl PeerAddr {
    pub const fn new(peer: PeerId, port: u32) -> Self {
        Self { peer, port }
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.peer, self.port)
    }
}

/// Parses `"<id>:<port>"` or `"peer.<id>:<port>"`.
impl FromStr for PeerAddr {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (peer, port) = s
            .rsplit_once(':')
            .ok_or_else(|| TypeError::InvalidPeerAddr(s.to_string()))?;
        let peer = peer.strip_prefix("peer.").unwrap_or(peer);
        let peer: u32 = peer
            .parse()
            .map_err(|_| TypeError::InvalidPeerAddr(s.to_string()))?;
        let port: u32 = port
            .parse()
            .map_err(|_| TypeError::InvalidPeerAddr(s.to_string()))?;
        Ok(Self::new(PeerId(peer), port))
    }
}
