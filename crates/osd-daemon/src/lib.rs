//! Object storage daemon (OSD).
//!
//! An OSD owns one local [`ObjectStore`](osd_store::ObjectStore) and answers
//! peer requests against it. The heart of the crate is [`Osd::dispatch`]:
//! it takes ownership of one inbound envelope, routes it to the Ping, Read,
//! Write or Op handler, sends the single correlated reply back to the
//! requester's (identity, port), and releases the envelope.
//!
//! Every recoverable failure (missing object, store I/O error, unknown op
//! code, malformed length) becomes a reply with a negative result code. The
//! daemon only stops on an explicit `Shutdown` message.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod liveness;
pub mod server;

pub use config::{OsdConfig, StoreBackend};
pub use dispatcher::{DispatchOutcome, DispatchStats, Osd};
pub use error::{OsdError, OsdResult, RequestError};
pub use liveness::{AlwaysAnswer, LivenessPolicy, PlayDead};
pub use server::OsdServer;
