use std::fmt;

use serde::{Deserialize, Serialize};

/// Owned, length-tagged byte buffer.
///
/// A `Payload` has a single owner at any time. Read data is moved from the
/// store into the reply, and write data is borrowed from the request only for
/// the duration of the store call. Nothing hands out a mutable alias into a
/// payload that is still owned elsewhere.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload(Vec<u8>);

impl Payload {
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    /// An empty payload (zero-length reply body).
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// The first `len` bytes, or the whole buffer if it is shorter.
    pub fn prefix(&self, len: usize) -> &[u8] {
        &self.0[..len.min(self.0.len())]
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Payload {
    fn from(data: Vec<u8>) -> Self {
        Self(data)
    }
}

impl From<&[u8]> for Payload {
    fn from(data: &[u8]) -> Self {
        Self(data.to_vec())
    }
}

impl AsRef<[u8]> for Payload {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// Buffers can be megabytes; print the length only.
impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload({} bytes)", self.0.len())
    }
}
