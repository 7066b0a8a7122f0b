use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use osd_protocol::{Envelope, MessageBody, OsdCodec};
use osd_types::PeerAddr;

use crate::error::{MessengerError, MessengerResult};
use crate::traits::Messenger;

/// In-memory messenger that records every outbound message.
///
/// Used to drive a dispatcher without a network: tests inspect
/// [`LoopbackMessenger::take_sent`] to see exactly which replies went where.
pub struct LoopbackMessenger {
    local: PeerAddr,
    codec: OsdCodec,
    sent: Mutex<Vec<(PeerAddr, Envelope)>>,
    shut_down: AtomicBool,
    reject_sends: AtomicBool,
}

impl LoopbackMessenger {
    pub fn new(local: PeerAddr) -> Self {
        Self {
            local,
            codec: OsdCodec::default(),
            sent: Mutex::new(Vec::new()),
            shut_down: AtomicBool::new(false),
            reject_sends: AtomicBool::new(false),
        }
    }

    /// Reject sends that `codec` could not frame, as the TCP messenger does.
    pub fn with_codec(mut self, codec: OsdCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Make every subsequent send fail with [`MessengerError::UnknownPeer`].
    pub fn set_reject_sends(&self, reject: bool) {
        self.reject_sends.store(reject, Ordering::SeqCst);
    }

    /// Snapshot of all messages sent so far, as (destination, envelope).
    pub fn sent(&self) -> Vec<(PeerAddr, Envelope)> {
        self.sent.lock().expect("lock poisoned").clone()
    }

    /// Drain the recorded messages.
    pub fn take_sent(&self) -> Vec<(PeerAddr, Envelope)> {
        std::mem::take(&mut *self.sent.lock().expect("lock poisoned"))
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().expect("lock poisoned").len()
    }
}

impl Messenger for LoopbackMessenger {
    fn local_addr(&self) -> PeerAddr {
        self.local
    }

    fn send_message(&self, body: MessageBody, dest: PeerAddr) -> MessengerResult<()> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(MessengerError::ShutDown);
        }
        if self.reject_sends.load(Ordering::SeqCst) {
            return Err(MessengerError::UnknownPeer(dest));
        }
        let envelope = Envelope::new(self.local, body);
        self.codec.encode(&envelope)?;
        self.sent
            .lock()
            .expect("lock poisoned")
            .push((dest, envelope));
        Ok(())
    }

    fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }

    fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for LoopbackMessenger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackMessenger")
            .field("local", &self.local)
            .field("sent", &self.sent_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osd_types::PeerId;

    fn addr(id: u32) -> PeerAddr {
        PeerAddr::new(PeerId(id), 0)
    }

    #[test]
    fn records_sent_messages_with_local_source() {
        let m = LoopbackMessenger::new(addr(1));
        m.send_message(MessageBody::Ping, addr(2)).unwrap();
        let sent = m.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, addr(2));
        assert_eq!(sent[0].1.source, addr(1));
        assert_eq!(sent[0].1.body, MessageBody::Ping);
    }

    #[test]
    fn take_sent_drains() {
        let m = LoopbackMessenger::new(addr(1));
        m.send_message(MessageBody::Ping, addr(2)).unwrap();
        assert_eq!(m.take_sent().len(), 1);
        assert_eq!(m.sent_count(), 0);
    }

    #[test]
    fn shutdown_rejects_further_sends() {
        let m = LoopbackMessenger::new(addr(1));
        m.shutdown();
        assert!(m.is_shut_down());
        assert!(matches!(
            m.send_message(MessageBody::Ping, addr(2)),
            Err(MessengerError::ShutDown)
        ));
    }

    #[test]
    fn reject_sends_reports_unknown_peer() {
        let m = LoopbackMessenger::new(addr(1));
        m.set_reject_sends(true);
        let err = m.send_message(MessageBody::Ping, addr(5)).unwrap_err();
        assert!(matches!(err, MessengerError::UnknownPeer(a) if a == addr(5)));
        assert_eq!(m.sent_count(), 0);
    }

    #[test]
    fn frames_too_large_for_codec_are_rejected() {
        use osd_protocol::{ProtocolError, WriteReply};
        use osd_types::ObjectId;

        let m = LoopbackMessenger::new(addr(1)).with_codec(OsdCodec::new(16));
        let reply = MessageBody::WriteReply(WriteReply {
            oid: ObjectId::from_name("w"),
            result: 0,
        });
        let err = m.send_message(reply, addr(2)).unwrap_err();
        assert!(matches!(
            err,
            MessengerError::Protocol(ProtocolError::MessageTooLarge { .. })
        ));
        m.send_message(MessageBody::Ping, addr(2)).unwrap();
        assert_eq!(m.sent_count(), 1);
    }
}
