use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use osd_types::{ObjectId, Payload};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::{check_range, ObjectStat, ObjectStore};

/// File-backed object store.
///
/// Each daemon gets its own directory `<base>/osd<whoami>/`, and each object
/// is a single file in it named by the object's hex id. Gaps left by writes
/// past the end read back as zeros (sparse files).
///
/// On-disk layout:
/// ```text
/// <base>/
///   osd0/
///     3f9a...e1   (object bytes)
///   osd1/
///     ...
/// ```
pub struct FileObjectStore {
    root: PathBuf,
    /// Serializes mutations so concurrent writers cannot interleave.
    write_lock: Mutex<()>,
}

impl FileObjectStore {
    /// Open (or create) the store directory for daemon `whoami` under `base`.
    pub fn open(base: &Path, whoami: u32) -> StoreResult<Self> {
        let root = base.join(format!("osd{whoami}"));
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "opened file object store");
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    /// Directory holding this daemon's objects.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, id: &ObjectId) -> PathBuf {
        self.root.join(id.to_hex())
    }
}

/// Map `ErrorKind::NotFound` onto [`StoreError::NotFound`] for `id`.
fn map_io(id: &ObjectId, err: io::Error) -> StoreError {
    if err.kind() == io::ErrorKind::NotFound {
        StoreError::NotFound(*id)
    } else {
        StoreError::Io(err)
    }
}

impl ObjectStore for FileObjectStore {
    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.object_path(id).try_exists()?)
    }

    fn stat(&self, id: &ObjectId) -> StoreResult<ObjectStat> {
        let meta = fs::metadata(self.object_path(id)).map_err(|e| map_io(id, e))?;
        Ok(ObjectStat { size: meta.len() })
    }

    fn read(&self, id: &ObjectId, length: u64, offset: u64) -> StoreResult<Payload> {
        let mut file = File::open(self.object_path(id)).map_err(|e| map_io(id, e))?;
        let size = file.metadata()?.len();
        if offset >= size {
            return Ok(Payload::empty());
        }
        let want = length.min(size - offset);
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = Vec::with_capacity(want as usize);
        file.take(want).read_to_end(&mut buf)?;
        Ok(Payload::new(buf))
    }

    fn write(&self, id: &ObjectId, offset: u64, data: &[u8]) -> StoreResult<u64> {
        check_range(offset, data.len() as u64)?;
        let _guard = self.write_lock.lock().expect("lock poisoned");
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.object_path(id))?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        file.flush()?;
        Ok(data.len() as u64)
    }

    fn destroy(&self, id: &ObjectId) -> StoreResult<()> {
        let _guard = self.write_lock.lock().expect("lock poisoned");
        fs::remove_file(self.object_path(id)).map_err(|e| map_io(id, e))
    }
}

impl std::fmt::Debug for FileObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileObjectStore")
            .field("root", &self.root)
            .finish()
    }
}
