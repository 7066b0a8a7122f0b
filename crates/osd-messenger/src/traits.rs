use osd_protocol::MessageBody;
use osd_types::PeerAddr;

use crate::error::MessengerResult;

/// Outbound side of a transport, as seen by the dispatcher.
///
/// `send_message` takes ownership of the body; once it returns the messenger
/// owns the message. Implementations must not block on the network: the
/// dispatcher calls this inline while handling a request.
pub trait Messenger: Send + Sync {
    /// Address stamped as `source` on every outbound message.
    fn local_addr(&self) -> PeerAddr;

    /// Queue `body` for delivery to `dest`.
    fn send_message(&self, body: MessageBody, dest: PeerAddr) -> MessengerResult<()>;

    /// Stop accepting and delivering messages.
    fn shutdown(&self);

    /// Returns `true` once [`Messenger::shutdown`] has been called.
    fn is_shut_down(&self) -> bool;
}
