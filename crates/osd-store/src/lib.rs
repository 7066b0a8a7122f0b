//! Local object storage for the object storage daemon.
//!
//! The daemon reaches its store only through the narrow [`ObjectStore`]
//! capability trait: existence, metadata, byte-range read/write, and destroy,
//! each keyed by an [`ObjectId`](osd_types::ObjectId).
//!
//! # Storage Backends
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//! - [`FileObjectStore`] -- one file per object under a per-daemon directory
//!
//! # Design Rules
//!
//! 1. Objects are mutable byte arrays; writes past the end extend the object
//!    and zero-fill any gap.
//! 2. A read never returns more bytes than requested, and never fails just
//!    because the range runs past the end of the object.
//! 3. Every operation is synchronous and returns a [`StoreResult`].
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use file::FileObjectStore;
pub use memory::InMemoryObjectStore;
pub use traits::{check_range, ObjectStat, ObjectStore, MAX_OBJECT_SIZE};
