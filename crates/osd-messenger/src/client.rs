use std::net::SocketAddr;
use std::time::Duration;

use osd_protocol::{
    Envelope, MessageBody, OpCode, OpReply, OpRequest, OsdCodec, ReadReply, ReadRequest,
    WriteReply, WriteRequest,
};
use osd_types::{ObjectId, Payload, PeerAddr};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{MessengerError, MessengerResult};

/// Default time to wait for a reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Peer-side connection to an OSD.
///
/// Requests are strictly one at a time: each call writes a frame and waits
/// for the next frame on the connection, which the daemon guarantees is the
/// reply since it handles requests serially.
pub struct OsdClient {
    local: PeerAddr,
    server: SocketAddr,
    codec: OsdCodec,
    stream: TcpStream,
    timeout: Duration,
}

impl OsdClient {
    /// Connect to the daemon at `server`, identifying as `local`.
    pub async fn connect(server: SocketAddr, local: PeerAddr) -> MessengerResult<Self> {
        let stream = TcpStream::connect(server).await?;
        stream.set_nodelay(true)?;
        debug!(%server, %local, "connected to osd");
        Ok(Self {
            local,
            server,
            codec: OsdCodec::default(),
            stream,
            timeout: DEFAULT_REPLY_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_codec(mut self, codec: OsdCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn local_addr(&self) -> PeerAddr {
        self.local
    }

    /// Send a message without waiting for a reply.
    pub async fn send(&mut self, body: MessageBody) -> MessengerResult<()> {
        let envelope = Envelope::new(self.local, body);
        self.codec.write_frame(&mut self.stream, &envelope).await?;
        Ok(())
    }

    /// Wait for the next inbound frame, up to the reply timeout.
    pub async fn recv(&mut self) -> MessengerResult<Envelope> {
        let frame = tokio::time::timeout(self.timeout, self.codec.read_frame(&mut self.stream))
            .await
            .map_err(|_| MessengerError::Timeout(self.timeout))??;
        frame.ok_or_else(|| MessengerError::Closed(self.server.to_string()))
    }

    /// Send a request and wait for its reply.
    pub async fn request(&mut self, body: MessageBody) -> MessengerResult<Envelope> {
        self.send(body).await?;
        self.recv().await
    }

    /// Ping the daemon. `Ok(false)` means no answer within the timeout.
    pub async fn ping(&mut self) -> MessengerResult<bool> {
        match self.request(MessageBody::Ping).await {
            Ok(Envelope {
                body: MessageBody::Ping,
                ..
            }) => Ok(true),
            Ok(other) => Err(unexpected("Ping", &other.body)),
            Err(MessengerError::Timeout(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn read(
        &mut self,
        oid: ObjectId,
        length: u64,
        offset: u64,
    ) -> MessengerResult<ReadReply> {
        let body = MessageBody::Read(ReadRequest {
            oid,
            length,
            offset,
        });
        match self.request(body).await?.body {
            MessageBody::ReadReply(reply) => Ok(reply),
            other => Err(unexpected("ReadReply", &other)),
        }
    }

    pub async fn write(
        &mut self,
        oid: ObjectId,
        offset: u64,
        payload: Payload,
    ) -> MessengerResult<WriteReply> {
        let body = MessageBody::Write(WriteRequest::new(oid, offset, payload));
        match self.request(body).await?.body {
            MessageBody::WriteReply(reply) => Ok(reply),
            other => Err(unexpected("WriteReply", &other)),
        }
    }

    pub async fn stat(&mut self, oid: ObjectId) -> MessengerResult<OpReply> {
        self.op(oid, OpCode::Stat.as_raw()).await
    }

    pub async fn delete(&mut self, oid: ObjectId) -> MessengerResult<OpReply> {
        self.op(oid, OpCode::Delete.as_raw()).await
    }

    /// Send an op with a raw op code (including codes the daemon may not know).
    pub async fn op(&mut self, oid: ObjectId, op: u32) -> MessengerResult<OpReply> {
        let body = MessageBody::Op(OpRequest { oid, op });
        match self.request(body).await?.body {
            MessageBody::OpReply(reply) => Ok(reply),
            other => Err(unexpected("OpReply", &other)),
        }
    }

    /// Ask the daemon to shut down. No reply is sent.
    pub async fn shutdown_daemon(&mut self) -> MessengerResult<()> {
        self.send(MessageBody::Shutdown).await
    }
}

fn unexpected(expected: &'static str, got: &MessageBody) -> MessengerError {
    MessengerError::UnexpectedReply {
        expected,
        got: got.type_name(),
    }
}

impl std::fmt::Debug for OsdClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OsdClient")
            .field("local", &self.local)
            .field("server", &self.server)
            .field("timeout", &self.timeout)
            .finish()
    }
}
