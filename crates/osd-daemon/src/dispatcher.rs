use std::sync::Arc;

use osd_messenger::{Messenger, MessengerError};
use osd_protocol::result::{self, ResultCode};
use osd_protocol::{
    Envelope, MessageBody, OpReply, OsdCodec, ProtocolError, ReadReply, WriteReply,
};
use osd_store::ObjectStore;
use osd_types::{Payload, PeerAddr, PeerId};
use tracing::{debug, info, warn};

use crate::handler;
use crate::liveness::{AlwaysAnswer, LivenessPolicy};

/// What [`Osd::dispatch`] did with a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A reply was handed to the messenger.
    Replied,
    /// A reply was built but the messenger refused it.
    SendFailed,
    /// A ping the liveness policy chose not to answer.
    Silent,
    /// Shutdown requested; the messenger has been shut down.
    Shutdown,
    /// Unrecognized message type; logged and discarded.
    Dropped,
}

/// Running counters kept by the dispatcher.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub received: u64,
    pub replied: u64,
    /// Replies that carried a negative result code.
    pub failed: u64,
    pub dropped: u64,
    pub send_errors: u64,
}

/// Request dispatcher for one object storage daemon.
///
/// `dispatch` takes `&mut self`, so the borrow checker rules out two
/// requests being handled at once; all per-object state lives in the store.
pub struct Osd {
    whoami: PeerId,
    store: Arc<dyn ObjectStore>,
    messenger: Arc<dyn Messenger>,
    liveness: Box<dyn LivenessPolicy>,
    /// Largest read payload that still fits in one reply frame.
    max_read_payload: u64,
    stats: DispatchStats,
}

impl Osd {
    pub fn new(whoami: PeerId, store: Arc<dyn ObjectStore>, messenger: Arc<dyn Messenger>) -> Self {
        Self {
            whoami,
            store,
            messenger,
            liveness: Box::new(AlwaysAnswer),
            max_read_payload: OsdCodec::default().max_read_payload(),
            stats: DispatchStats::default(),
        }
    }

    pub fn with_liveness(mut self, policy: Box<dyn LivenessPolicy>) -> Self {
        self.liveness = policy;
        self
    }

    /// Size reads so their replies fit in frames of `max_message_size`.
    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_read_payload = OsdCodec::new(max_message_size).max_read_payload();
        self
    }

    pub fn whoami(&self) -> PeerId {
        self.whoami
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Handle one inbound message.
    ///
    /// Takes ownership of `envelope`. Every Ping (unless the liveness policy
    /// stays silent), Read, Write and Op produces exactly one reply to
    /// `envelope.source`, sent before the envelope is dropped at the end of
    /// this call. Shutdown and unrecognized messages get no reply.
    pub fn dispatch(&mut self, envelope: Envelope) -> DispatchOutcome {
        self.stats.received += 1;
        let Envelope { source, body } = envelope;
        let _span = tracing::debug_span!(
            "dispatch",
            osd = self.whoami.get(),
            peer = %source,
            kind = body.type_name()
        )
        .entered();

        match body {
            MessageBody::Shutdown => {
                info!("shutdown requested");
                self.messenger.shutdown();
                DispatchOutcome::Shutdown
            }
            MessageBody::Ping => match handler::handle_ping(&*self.liveness, self.whoami, source) {
                Some(reply) => self.reply(source, reply),
                None => DispatchOutcome::Silent,
            },
            MessageBody::Read(request) => {
                let reply = handler::handle_read(&*self.store, &request, self.max_read_payload);
                self.reply(source, MessageBody::ReadReply(reply))
            }
            MessageBody::Write(request) => {
                let reply = handler::handle_write(&*self.store, &request);
                self.reply(source, MessageBody::WriteReply(reply))
            }
            MessageBody::Op(request) => {
                let reply = handler::handle_op(&*self.store, &request);
                self.reply(source, MessageBody::OpReply(reply))
            }
            other => {
                warn!(type_tag = other.type_tag(), "got unknown message");
                self.stats.dropped += 1;
                DispatchOutcome::Dropped
            }
        }
    }

    /// Send `body` to `dest`. A reply too large to frame is replaced by an
    /// `EMSGSIZE` failure reply so the requester still hears back.
    fn reply(&mut self, dest: PeerAddr, body: MessageBody) -> DispatchOutcome {
        let fallback = failure_reply(&body, result::EMSGSIZE);
        let failed = reply_result(&body).is_some_and(|code| code < 0);
        let sent = match self.messenger.send_message(body, dest) {
            Err(MessengerError::Protocol(ProtocolError::MessageTooLarge { size, max })) => {
                warn!(%dest, size, max, "reply too large for one frame");
                match fallback {
                    Some(fallback) => self.messenger.send_message(fallback, dest).map(|()| true),
                    None => Err(MessengerError::Protocol(ProtocolError::MessageTooLarge {
                        size,
                        max,
                    })),
                }
            }
            other => other.map(|()| failed),
        };
        match sent {
            Ok(failed) => {
                debug!(%dest, "reply sent");
                if failed {
                    self.stats.failed += 1;
                }
                self.stats.replied += 1;
                DispatchOutcome::Replied
            }
            Err(e) => {
                warn!(%dest, error = %e, "failed to send reply");
                self.stats.send_errors += 1;
                DispatchOutcome::SendFailed
            }
        }
    }
}

fn reply_result(body: &MessageBody) -> Option<ResultCode> {
    match body {
        MessageBody::ReadReply(r) => Some(r.result),
        MessageBody::WriteReply(r) => Some(r.result),
        MessageBody::OpReply(r) => Some(r.result),
        _ => None,
    }
}

/// Payload-free copy of a reply carrying `code` instead of its result.
fn failure_reply(body: &MessageBody, code: ResultCode) -> Option<MessageBody> {
    match body {
        MessageBody::ReadReply(r) => Some(MessageBody::ReadReply(ReadReply {
            oid: r.oid,
            offset: r.offset,
            result: code,
            length: 0,
            payload: Payload::empty(),
        })),
        MessageBody::WriteReply(r) => Some(MessageBody::WriteReply(WriteReply {
            oid: r.oid,
            result: code,
        })),
        MessageBody::OpReply(r) => Some(MessageBody::OpReply(OpReply {
            oid: r.oid,
            op: r.op,
            result: code,
            size: 0,
        })),
        _ => None,
    }
}

impl std::fmt::Debug for Osd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Osd")
            .field("whoami", &self.whoami)
            .field("liveness", &self.liveness.name())
            .field("stats", &self.stats)
            .finish()
    }
}
