//! Wire protocol for the object storage daemon.
//!
//! Defines the request/reply message types exchanged between peers and an
//! OSD, the signed result codes carried by replies, and the length-prefixed
//! framing used on stream transports.

pub mod codec;
pub mod error;
pub mod message;
pub mod result;

pub use codec::OsdCodec;
pub use error::{ProtocolError, ProtocolResult};
pub use message::{
    tags, Envelope, MessageBody, OpCode, OpReply, OpRequest, ReadReply, ReadRequest, WriteReply,
    WriteRequest, MAX_FRAME_BODY, MAX_MESSAGE_SIZE,
};
pub use result::ResultCode;
