use std::collections::HashMap;
use std::sync::RwLock;

use osd_types::{ObjectId, Payload};

use crate::error::{StoreError, StoreResult};
use crate::traits::{check_range, ObjectStat, ObjectStore};

/// In-memory, HashMap-based object store.
///
/// Intended for tests and embedding. Object bytes are held behind a
/// `RwLock` for safe concurrent access.
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<ObjectId, Vec<u8>>>,
}

impl InMemoryObjectStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored objects.
    pub fn total_bytes(&self) -> u64 {
        self.objects
            .read()
            .expect("lock poisoned")
            .values()
            .map(|data| data.len() as u64)
            .sum()
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.contains_key(id))
    }

    fn stat(&self, id: &ObjectId) -> StoreResult<ObjectStat> {
        let map = self.objects.read().expect("lock poisoned");
        let data = map.get(id).ok_or(StoreError::NotFound(*id))?;
        Ok(ObjectStat {
            size: data.len() as u64,
        })
    }

    fn read(&self, id: &ObjectId, length: u64, offset: u64) -> StoreResult<Payload> {
        let map = self.objects.read().expect("lock poisoned");
        let data = map.get(id).ok_or(StoreError::NotFound(*id))?;
        let size = data.len() as u64;
        if offset >= size {
            return Ok(Payload::empty());
        }
        let end = offset.saturating_add(length).min(size);
        Ok(Payload::from(&data[offset as usize..end as usize]))
    }

    fn write(&self, id: &ObjectId, offset: u64, data: &[u8]) -> StoreResult<u64> {
        let end = check_range(offset, data.len() as u64)? as usize;
        let start = offset as usize;
        let mut map = self.objects.write().expect("lock poisoned");
        let object = map.entry(*id).or_default();
        if object.len() < end {
            object.resize(end, 0);
        }
        object[start..end].copy_from_slice(data);
        Ok(data.len() as u64)
    }

    fn destroy(&self, id: &ObjectId) -> StoreResult<()> {
        let mut map = self.objects.write().expect("lock poisoned");
        map.remove(id).map(|_| ()).ok_or(StoreError::NotFound(*id))
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len();
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &count)
            .finish()
    }
}
