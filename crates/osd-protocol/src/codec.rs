use bytes::{Buf, BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use osd_types::{ObjectId, Payload, PeerAddr, PeerId};

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{tags, Envelope, MessageBody, ReadReply, MAX_FRAME_BODY, MAX_MESSAGE_SIZE};

/// Frame header: 4 bytes length + 1 byte type tag.
const HEADER_SIZE: usize = 5;

/// Codec for encoding/decoding framed OSD envelopes.
///
/// Frame layout: `[u32 BE len][u8 tag][bincode source][bincode body]`, where
/// `len` counts the tag and everything after it. A known tag whose body does
/// not decode is an error; an unknown tag decodes to
/// [`MessageBody::Unknown`] so the receiver can log and drop it.
#[derive(Clone, Copy, Debug)]
pub struct OsdCodec {
    max_message_size: usize,
}

impl Default for OsdCodec {
    fn default() -> Self {
        Self::new(MAX_MESSAGE_SIZE)
    }
}

impl OsdCodec {
    pub fn new(max_message_size: usize) -> Self {
        Self { max_message_size }
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Largest read payload whose `ReadReply` still fits in one frame.
    pub fn max_read_payload(&self) -> u64 {
        let empty = ReadReply {
            oid: ObjectId::from_raw([0; 32]),
            offset: 0,
            result: 0,
            length: 0,
            payload: Payload::empty(),
        };
        let header = bincode::serialized_size(&(PeerAddr::new(PeerId(0), 0), &empty))
            .unwrap_or(u64::MAX);
        (self.max_message_size as u64).saturating_sub(header)
    }

    /// Encode an envelope into a complete frame.
    pub fn encode(&self, envelope: &Envelope) -> ProtocolResult<Vec<u8>> {
        let source = &envelope.source;
        let payload = match &envelope.body {
            MessageBody::Shutdown | MessageBody::Ping => serialize(source)?,
            MessageBody::Read(m) => serialize(&(source, m))?,
            MessageBody::ReadReply(m) => serialize(&(source, m))?,
            MessageBody::Write(m) => serialize(&(source, m))?,
            MessageBody::WriteReply(m) => serialize(&(source, m))?,
            MessageBody::Op(m) => serialize(&(source, m))?,
            MessageBody::OpReply(m) => serialize(&(source, m))?,
            MessageBody::Unknown { type_tag } => {
                return Err(ProtocolError::InvalidMessageType(*type_tag))
            }
        };
        if payload.len() > self.max_message_size {
            return Err(ProtocolError::MessageTooLarge {
                size: payload.len(),
                max: self.max_message_size,
            });
        }
        let len = u32::try_from(payload.len() + 1)
            .ok()
            .filter(|_| payload.len() <= MAX_FRAME_BODY)
            .ok_or(ProtocolError::MessageTooLarge {
                size: payload.len(),
                max: MAX_FRAME_BODY,
            })?;
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
        buf.put_u32(len);
        buf.put_u8(envelope.body.type_tag());
        buf.put_slice(&payload);
        Ok(buf.to_vec())
    }

    /// Decode one frame from the front of `data`. Returns (envelope, bytes_consumed).
    pub fn decode(&self, data: &[u8]) -> ProtocolResult<(Envelope, usize)> {
        if data.len() < HEADER_SIZE {
            return Err(ProtocolError::FramingError("too short".into()));
        }
        let mut header = &data[..HEADER_SIZE];
        let len = header.get_u32() as usize;
        let tag = header.get_u8();
        self.check_len(len)?;
        let total = 4 + len;
        if data.len() < total {
            return Err(ProtocolError::FramingError(format!(
                "incomplete: have {}, need {}",
                data.len(),
                total
            )));
        }
        let envelope = Self::decode_body(tag, &data[HEADER_SIZE..total])?;
        Ok((envelope, total))
    }

    /// Read one frame from an async stream.
    ///
    /// Returns `Ok(None)` on a clean end-of-stream before a new frame starts.
    pub async fn read_frame<R>(&self, reader: &mut R) -> ProtocolResult<Option<Envelope>>
    where
        R: AsyncRead + Unpin,
    {
        let len = match reader.read_u32().await {
            Ok(len) => len as usize,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        self.check_len(len)?;
        let tag = reader.read_u8().await?;
        let mut payload = vec![0u8; len - 1];
        reader.read_exact(&mut payload).await?;
        Self::decode_body(tag, &payload).map(Some)
    }

    /// Encode and write one frame to an async stream.
    pub async fn write_frame<W>(&self, writer: &mut W, envelope: &Envelope) -> ProtocolResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        let frame = self.encode(envelope)?;
        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok(())
    }

    fn check_len(&self, len: usize) -> ProtocolResult<()> {
        if len < 1 {
            return Err(ProtocolError::FramingError("zero-length frame".into()));
        }
        if len - 1 > self.max_message_size {
            return Err(ProtocolError::MessageTooLarge {
                size: len - 1,
                max: self.max_message_size,
            });
        }
        Ok(())
    }

    fn decode_body(tag: u8, payload: &[u8]) -> ProtocolResult<Envelope> {
        let (source, body) = match tag {
            tags::SHUTDOWN => (deserialize(payload)?, MessageBody::Shutdown),
            tags::PING => (deserialize(payload)?, MessageBody::Ping),
            tags::READ => with_source(payload, MessageBody::Read)?,
            tags::READ_REPLY => with_source(payload, MessageBody::ReadReply)?,
            tags::WRITE => with_source(payload, MessageBody::Write)?,
            tags::WRITE_REPLY => with_source(payload, MessageBody::WriteReply)?,
            tags::OP => with_source(payload, MessageBody::Op)?,
            tags::OP_REPLY => with_source(payload, MessageBody::OpReply)?,
            type_tag => (deserialize(payload)?, MessageBody::Unknown { type_tag }),
        };
        Ok(Envelope { source, body })
    }
}

fn serialize<T: Serialize + ?Sized>(value: &T) -> ProtocolResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| ProtocolError::Serialization(e.to_string()))
}

fn deserialize<T: DeserializeOwned>(data: &[u8]) -> ProtocolResult<T> {
    bincode::deserialize(data).map_err(|e| ProtocolError::Deserialization(e.to_string()))
}

fn with_source<T, F>(payload: &[u8], wrap: F) -> ProtocolResult<(PeerAddr, MessageBody)>
where
    T: DeserializeOwned,
    F: FnOnce(T) -> MessageBody,
{
    let (source, inner): (PeerAddr, T) = deserialize(payload)?;
    Ok((source, wrap(inner)))
}
