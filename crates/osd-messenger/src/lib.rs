//! Message delivery for the object storage daemon.
//!
//! The dispatcher only sees the [`Messenger`] trait: it receives inbound
//! envelopes from some transport and hands reply bodies back for delivery to
//! a [`PeerAddr`](osd_types::PeerAddr). Two transports are provided:
//!
//! - [`LoopbackMessenger`] -- records outbound messages in memory (tests, embedding)
//! - [`TcpMessenger`] -- framed TCP; every connection feeds one serial [`Inbox`]
//!
//! [`OsdClient`] is the peer side of the TCP transport.

pub mod client;
pub mod error;
pub mod loopback;
pub mod tcp;
pub mod traits;

pub use client::OsdClient;
pub use error::{MessengerError, MessengerResult};
pub use loopback::LoopbackMessenger;
pub use tcp::{Inbox, TcpMessenger};
pub use traits::Messenger;
