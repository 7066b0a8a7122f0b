//! Foundation types for the object storage daemon (OSD).
//!
//! Every other OSD crate depends on `osd-types`.
//!
//! # Key Types
//!
//! - [`ObjectId`] -- Opaque, stable identifier for a stored object
//! - [`PeerId`] -- Numeric identity of a daemon or client on the network
//! - [`PeerAddr`] -- (identity, port) pair used to address replies
//! - [`Payload`] -- Owned, length-tagged byte buffer moved between store and wire

pub mod error;
pub mod object;
pub mod payload;
pub mod peer;

pub use error::TypeError;
pub use object::ObjectId;
pub use payload::Payload;
pub use peer::{PeerAddr, PeerId};
