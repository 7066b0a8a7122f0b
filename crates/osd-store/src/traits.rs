use osd_types::{ObjectId, Payload};

use crate::error::{StoreError, StoreResult};

/// Largest addressable object size (offset + length) in bytes: 4 GiB.
pub const MAX_OBJECT_SIZE: u64 = 1 << 32;

/// Metadata reported by [`ObjectStore::stat`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ObjectStat {
    /// Current object size in bytes (highest offset + length written).
    pub size: u64,
}

/// Capability interface the daemon uses to reach its local store.
///
/// All implementations must satisfy these invariants:
/// - `read` returns at most `length` bytes, starting at `offset`. A range
///   that runs past the end is truncated; a range entirely past the end
///   yields an empty payload.
/// - A `write` is visible to every later `read`/`stat` of the same id.
/// - Operations on a missing object (other than `exists` and `write`) fail
///   with [`StoreError::NotFound`].
/// - Implementations are `Send + Sync` and safe under concurrent access,
///   even though the dispatcher only issues one call at a time.
pub trait ObjectStore: Send + Sync {
    /// Check whether an object exists.
    fn exists(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Report object metadata.
    fn stat(&self, id: &ObjectId) -> StoreResult<ObjectStat>;

    /// Read up to `length` bytes at `offset`.
    fn read(&self, id: &ObjectId, length: u64, offset: u64) -> StoreResult<Payload>;

    /// Write `data` at `offset`, creating the object if needed.
    ///
    /// Returns the number of bytes written.
    fn write(&self, id: &ObjectId, offset: u64, data: &[u8]) -> StoreResult<u64>;

    /// Remove an object.
    fn destroy(&self, id: &ObjectId) -> StoreResult<()>;
}

/// Reject ranges whose end overflows or exceeds [`MAX_OBJECT_SIZE`].
pub fn check_range(offset: u64, length: u64) -> StoreResult<u64> {
    match offset.checked_add(length) {
        Some(end) if end <= MAX_OBJECT_SIZE => Ok(end),
        _ => Err(StoreError::InvalidRange { offset, length }),
    }
}
