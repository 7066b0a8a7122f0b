use std::time::Duration;

use osd_types::PeerAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessengerError {
    #[error("no route to {0}")]
    UnknownPeer(PeerAddr),

    #[error("connection to {0} is closed")]
    Closed(String),

    #[error("messenger is shut down")]
    ShutDown,

    #[error("timed out after {0:?} waiting for a reply")]
    Timeout(Duration),

    #[error("unexpected reply: expected {expected}, got {got}")]
    UnexpectedReply {
        expected: &'static str,
        got: &'static str,
    },

    #[error("protocol error: {0}")]
    Protocol(#[from] osd_protocol::ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type MessengerResult<T> = Result<T, MessengerError>;
