use serde::{Deserialize, Serialize};
use osd_types::{ObjectId, Payload, PeerAddr};

use crate::result::{self, ResultCode};

pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;
/// Largest body a frame can carry: the `u32` length field also counts the tag byte.
pub const MAX_FRAME_BODY: usize = u32::MAX as usize - 1;

/// Wire type tags, one per [`MessageBody`] variant.
pub mod tags {
    pub const SHUTDOWN: u8 = 1;
    pub const PING: u8 = 2;
    pub const READ: u8 = 3;
    pub const READ_REPLY: u8 = 4;
    pub const WRITE: u8 = 5;
    pub const WRITE_REPLY: u8 = 6;
    pub const OP: u8 = 7;
    pub const OP_REPLY: u8 = 8;
}

/// An inbound or outbound message together with its originating address.
///
/// The messenger stamps `source` on delivery; handlers reply to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub source: PeerAddr,
    pub body: MessageBody,
}

impl Envelope {
    pub fn new(source: PeerAddr, body: MessageBody) -> Self {
        Self { source, body }
    }
}

/// All message types in the OSD protocol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageBody {
    Shutdown,
    Ping,
    Read(ReadRequest),
    ReadReply(ReadReply),
    Write(WriteRequest),
    WriteReply(WriteReply),
    Op(OpRequest),
    OpReply(OpReply),
    /// A frame whose type tag this build does not know.
    Unknown { type_tag: u8 },
}

impl MessageBody {
    pub fn type_tag(&self) -> u8 {
        match self {
            Self::Shutdown => tags::SHUTDOWN,
            Self::Ping => tags::PING,
            Self::Read(_) => tags::READ,
            Self::ReadReply(_) => tags::READ_REPLY,
            Self::Write(_) => tags::WRITE,
            Self::WriteReply(_) => tags::WRITE_REPLY,
            Self::Op(_) => tags::OP,
            Self::OpReply(_) => tags::OP_REPLY,
            Self::Unknown { type_tag } => *type_tag,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Shutdown => "Shutdown",
            Self::Ping => "Ping",
            Self::Read(_) => "Read",
            Self::ReadReply(_) => "ReadReply",
            Self::Write(_) => "Write",
            Self::WriteReply(_) => "WriteReply",
            Self::Op(_) => "Op",
            Self::OpReply(_) => "OpReply",
            Self::Unknown { .. } => "Unknown",
        }
    }

    /// Returns `true` for the reply variants.
    pub fn is_reply(&self) -> bool {
        matches!(
            self,
            Self::ReadReply(_) | Self::WriteReply(_) | Self::OpReply(_)
        )
    }
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRequest {
    pub oid: ObjectId,
    pub length: u64,
    pub offset: u64,
}

/// Reply to a [`ReadRequest`].
///
/// `length` is always the number of bytes actually returned, never the
/// requested length.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReply {
    pub oid: ObjectId,
    pub offset: u64,
    pub result: ResultCode,
    pub length: u64,
    pub payload: Payload,
}

impl ReadReply {
    /// Successful read; result and length both equal the bytes transferred.
    pub fn success(request: &ReadRequest, payload: Payload) -> Self {
        let got = payload.len() as u64;
        Self {
            oid: request.oid,
            offset: request.offset,
            result: got as ResultCode,
            length: got,
            payload,
        }
    }

    /// Failed read: negative result, zero length, empty payload.
    pub fn failure(request: &ReadRequest, code: ResultCode) -> Self {
        debug_assert!(code < 0, "failure reply needs a negative code");
        Self {
            oid: request.oid,
            offset: request.offset,
            result: code,
            length: 0,
            payload: Payload::empty(),
        }
    }
}

// ---------------------------------------------------------------------------
// Write
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRequest {
    pub oid: ObjectId,
    /// Number of payload bytes to write; must not exceed `payload.len()`.
    pub length: u64,
    pub offset: u64,
    pub payload: Payload,
}

impl WriteRequest {
    /// A request writing the whole payload at `offset`.
    pub fn new(oid: ObjectId, offset: u64, payload: Payload) -> Self {
        Self {
            oid,
            length: payload.len() as u64,
            offset,
            payload,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteReply {
    pub oid: ObjectId,
    pub result: ResultCode,
}

// ---------------------------------------------------------------------------
// Op (Stat / Delete)
// ---------------------------------------------------------------------------

/// Sub-operations carried by [`OpRequest`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpCode {
    Delete,
    Stat,
}

impl OpCode {
    pub const fn as_raw(self) -> u32 {
        match self {
            Self::Delete => 1,
            Self::Stat => 2,
        }
    }

    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(Self::Delete),
            2 => Some(Self::Stat),
            _ => None,
        }
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delete => write!(f, "delete"),
            Self::Stat => write!(f, "stat"),
        }
    }
}

/// Metadata operation on an object.
///
/// The op code travels raw so that codes unknown to this build still reach
/// the dispatcher and get a failure reply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpRequest {
    pub oid: ObjectId,
    pub op: u32,
}

impl OpRequest {
    pub fn new(oid: ObjectId, op: OpCode) -> Self {
        Self {
            oid,
            op: op.as_raw(),
        }
    }

    pub fn op_code(&self) -> Option<OpCode> {
        OpCode::from_raw(self.op)
    }
}

/// Reply to an [`OpRequest`]. `size` is only meaningful for a successful stat.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpReply {
    pub oid: ObjectId,
    pub op: u32,
    pub result: ResultCode,
    pub size: u64,
}

impl OpReply {
    pub fn new(request: &OpRequest, result: ResultCode) -> Self {
        Self {
            oid: request.oid,
            op: request.op,
            result,
            size: 0,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn is_success(&self) -> bool {
        result::is_success(self.result)
    }
}
