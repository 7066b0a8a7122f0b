//! Per-request handlers.
//!
//! Each handler turns one request into store calls and returns the reply
//! body. Handlers never fail: every error is folded into the reply's result
//! code. Sending is left to the dispatcher.

use osd_protocol::result::{self, ResultCode};
use osd_protocol::{
    MessageBody, OpCode, OpReply, OpRequest, ReadReply, ReadRequest, WriteReply, WriteRequest,
};
use osd_store::ObjectStore;
use osd_types::{Payload, PeerAddr, PeerId};
use tracing::{debug, warn};

use crate::error::RequestError;
use crate::liveness::LivenessPolicy;

/// Reply with a ping unless the liveness policy says to stay silent.
pub fn handle_ping(
    policy: &dyn LivenessPolicy,
    whoami: PeerId,
    from: PeerAddr,
) -> Option<MessageBody> {
    if policy.answers_ping(whoami, from) {
        debug!("got ping, replying");
        Some(MessageBody::Ping)
    } else {
        debug!(policy = policy.name(), "got ping, playing dead");
        None
    }
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// Read up to `length` bytes at `offset`, but never more than
/// `max_payload`, the most a single reply frame can carry.
///
/// A missing object short-circuits to an `ENOENT` reply without touching
/// the data path. The reply length is the number of bytes the store
/// actually returned, so a clamped read is a short read.
pub fn handle_read(store: &dyn ObjectStore, request: &ReadRequest, max_payload: u64) -> ReadReply {
    let length = request.length.min(max_payload);
    match read_object(store, request, length) {
        Ok(payload) => {
            debug!(
                oid = %request.oid,
                got = payload.len(),
                requested = request.length,
                clamped = length < request.length,
                offset = request.offset,
                "read"
            );
            ReadReply::success(request, payload)
        }
        Err(e) => {
            log_failure("read", &e);
            ReadReply::failure(request, e.result_code())
        }
    }
}

fn read_object(
    store: &dyn ObjectStore,
    request: &ReadRequest,
    length: u64,
) -> Result<Payload, RequestError> {
    if !store.exists(&request.oid)? {
        return Err(RequestError::NotFound(request.oid));
    }
    let payload = store.read(&request.oid, length, request.offset)?;
    if payload.len() as u64 > length {
        return Err(RequestError::Io(format!(
            "store returned {} bytes for a {} byte read",
            payload.len(),
            length
        )));
    }
    Ok(payload)
}

// ---------------------------------------------------------------------------
// Write
// ---------------------------------------------------------------------------

/// Write the first `length` bytes of the request buffer at `offset`.
///
/// Success carries the number of bytes written as the result.
pub fn handle_write(store: &dyn ObjectStore, request: &WriteRequest) -> WriteReply {
    let code = match write_object(store, request) {
        Ok(written) => {
            debug!(oid = %request.oid, written, offset = request.offset, "write");
            written as ResultCode
        }
        Err(e) => {
            log_failure("write", &e);
            e.result_code()
        }
    };
    WriteReply {
        oid: request.oid,
        result: code,
    }
}

fn write_object(store: &dyn ObjectStore, request: &WriteRequest) -> Result<u64, RequestError> {
    let len = usize::try_from(request.length)
        .ok()
        .filter(|len| *len <= request.payload.len())
        .ok_or_else(|| {
            RequestError::Invalid(format!(
                "length {} exceeds buffer of {} bytes",
                request.length,
                request.payload.len()
            ))
        })?;
    Ok(store.write(&request.oid, request.offset, request.payload.prefix(len))?)
}

// ---------------------------------------------------------------------------
// Op (Stat / Delete)
// ---------------------------------------------------------------------------

/// Run a metadata op. Unknown op codes get an `EOPNOTSUPP` reply.
pub fn handle_op(store: &dyn ObjectStore, request: &OpRequest) -> OpReply {
    match request.op_code() {
        Some(OpCode::Delete) => {
            let code = match store.destroy(&request.oid) {
                Ok(()) => result::OK,
                Err(e) => fail("delete", e.into()),
            };
            debug!(oid = %request.oid, code, "delete");
            OpReply::new(request, code)
        }
        Some(OpCode::Stat) => match store.stat(&request.oid) {
            Ok(stat) => {
                debug!(oid = %request.oid, size = stat.size, "stat");
                OpReply::new(request, result::OK).with_size(stat.size)
            }
            Err(e) => OpReply::new(request, fail("stat", e.into())),
        },
        None => OpReply::new(request, fail("op", RequestError::UnsupportedOp(request.op))),
    }
}

fn fail(op: &'static str, err: RequestError) -> ResultCode {
    log_failure(op, &err);
    err.result_code()
}

fn log_failure(op: &'static str, err: &RequestError) {
    match err {
        RequestError::NotFound(_) => debug!(op, error = %err, "request failed"),
        _ => warn!(op, error = %err, "request failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use osd_store::{InMemoryObjectStore, ObjectStat, StoreResult};
    use osd_types::ObjectId;

    use crate::liveness::{AlwaysAnswer, PlayDead};

    fn oid(name: &str) -> ObjectId {
        ObjectId::from_name(name)
    }

    fn store_with(name: &str, data: &[u8]) -> InMemoryObjectStore {
        let store = InMemoryObjectStore::new();
        store.write(&oid(name), 0, data).unwrap();
        store
    }

    /// Store whose every operation fails with an I/O error.
    struct BrokenStore;

    impl ObjectStore for BrokenStore {
        fn exists(&self, _id: &ObjectId) -> StoreResult<bool> {
            Ok(true)
        }
        fn stat(&self, _id: &ObjectId) -> StoreResult<ObjectStat> {
            Err(std::io::Error::other("stat failed").into())
        }
        fn read(&self, _id: &ObjectId, _length: u64, _offset: u64) -> StoreResult<Payload> {
            Err(std::io::Error::other("read failed").into())
        }
        fn write(&self, _id: &ObjectId, _offset: u64, _data: &[u8]) -> StoreResult<u64> {
            Err(std::io::Error::other("disk full").into())
        }
        fn destroy(&self, _id: &ObjectId) -> StoreResult<()> {
            Err(std::io::Error::other("destroy failed").into())
        }
    }

    /// Store whose existence check fails; records whether `read` ran.
    #[derive(Default)]
    struct ExistsFailsStore {
        read_called: AtomicBool,
    }

    impl ObjectStore for ExistsFailsStore {
        fn exists(&self, _id: &ObjectId) -> StoreResult<bool> {
            Err(std::io::Error::other("metadata lookup failed").into())
        }
        fn stat(&self, _id: &ObjectId) -> StoreResult<ObjectStat> {
            Ok(ObjectStat { size: 4 })
        }
        fn read(&self, _id: &ObjectId, _length: u64, _offset: u64) -> StoreResult<Payload> {
            self.read_called.store(true, Ordering::SeqCst);
            Ok(Payload::new(vec![1; 4]))
        }
        fn write(&self, _id: &ObjectId, _offset: u64, data: &[u8]) -> StoreResult<u64> {
            Ok(data.len() as u64)
        }
        fn destroy(&self, _id: &ObjectId) -> StoreResult<()> {
            Ok(())
        }
    }

    /// Store that ignores the requested length on read.
    struct OverreadStore;

    impl ObjectStore for OverreadStore {
        fn exists(&self, _id: &ObjectId) -> StoreResult<bool> {
            Ok(true)
        }
        fn stat(&self, _id: &ObjectId) -> StoreResult<ObjectStat> {
            Ok(ObjectStat { size: 64 })
        }
        fn read(&self, _id: &ObjectId, _length: u64, _offset: u64) -> StoreResult<Payload> {
            Ok(Payload::new(vec![0xee; 64]))
        }
        fn write(&self, _id: &ObjectId, _offset: u64, data: &[u8]) -> StoreResult<u64> {
            Ok(data.len() as u64)
        }
        fn destroy(&self, _id: &ObjectId) -> StoreResult<()> {
            Ok(())
        }
    }

    // -----------------------------------------------------------------------
    // Ping
    // -----------------------------------------------------------------------

    #[test]
    fn ping_answered_by_default() {
        let from = PeerAddr::new(PeerId(5), 1);
        assert_eq!(
            handle_ping(&AlwaysAnswer, PeerId(0), from),
            Some(MessageBody::Ping)
        );
    }

    #[test]
    fn ping_ignored_when_playing_dead() {
        let from = PeerAddr::new(PeerId(5), 1);
        let policy = PlayDead::new([PeerId(3)]);
        assert_eq!(handle_ping(&policy, PeerId(3), from), None);
        assert!(handle_ping(&policy, PeerId(2), from).is_some());
    }

    // -----------------------------------------------------------------------
    // Read
    // -----------------------------------------------------------------------

    #[test]
    fn read_missing_object_is_enoent_with_no_bytes() {
        let store = InMemoryObjectStore::new();
        let req = ReadRequest {
            oid: oid("ghost"),
            length: 10,
            offset: 0,
        };
        let reply = handle_read(&store, &req, u64::MAX);
        assert_eq!(reply.result, result::ENOENT);
        assert_eq!(reply.length, 0);
        assert!(reply.payload.is_empty());
    }

    #[test]
    fn partial_read_reports_actual_length() {
        let store = store_with("obj", b"0123456789");
        let req = ReadRequest {
            oid: oid("obj"),
            length: 100,
            offset: 6,
        };
        let reply = handle_read(&store, &req, u64::MAX);
        assert_eq!(reply.result, 4);
        assert_eq!(reply.length, 4);
        assert_eq!(reply.payload.as_slice(), b"6789");
    }

    #[test]
    fn read_past_end_is_empty_success() {
        let store = store_with("obj", b"abc");
        let req = ReadRequest {
            oid: oid("obj"),
            length: 8,
            offset: 50,
        };
        let reply = handle_read(&store, &req, u64::MAX);
        assert_eq!(reply.result, 0);
        assert_eq!(reply.length, 0);
    }

    #[test]
    fn read_store_failure_is_eio() {
        let req = ReadRequest {
            oid: oid("x"),
            length: 4,
            offset: 0,
        };
        let reply = handle_read(&BrokenStore, &req, u64::MAX);
        assert_eq!(reply.result, result::EIO);
        assert!(reply.payload.is_empty());
    }

    #[test]
    fn overlong_store_read_is_rejected() {
        let req = ReadRequest {
            oid: oid("x"),
            length: 8,
            offset: 0,
        };
        let reply = handle_read(&OverreadStore, &req, u64::MAX);
        assert_eq!(reply.result, result::EIO);
        assert_eq!(reply.length, 0);
    }

    #[test]
    fn exists_failure_is_reported_without_reading() {
        let store = ExistsFailsStore::default();
        let req = ReadRequest {
            oid: oid("x"),
            length: 4,
            offset: 0,
        };
        let reply = handle_read(&store, &req, u64::MAX);
        assert_eq!(reply.result, result::EIO);
        assert_eq!(reply.length, 0);
        assert!(reply.payload.is_empty());
        assert!(!store.read_called.load(Ordering::SeqCst));
    }

    #[test]
    fn read_is_clamped_to_frame_budget() {
        let store = store_with("big", &[7u8; 100]);
        let req = ReadRequest {
            oid: oid("big"),
            length: 100,
            offset: 10,
        };
        let reply = handle_read(&store, &req, 32);
        assert_eq!(reply.result, 32);
        assert_eq!(reply.length, 32);
        assert_eq!(reply.payload.as_slice(), &[7u8; 32][..]);
        assert_eq!(reply.offset, 10);
    }

    #[test]
    fn zero_budget_reads_nothing() {
        let store = store_with("obj", b"abc");
        let req = ReadRequest {
            oid: oid("obj"),
            length: 3,
            offset: 0,
        };
        let reply = handle_read(&store, &req, 0);
        assert_eq!(reply.result, 0);
        assert!(reply.payload.is_empty());
    }

    // -----------------------------------------------------------------------
    // Write
    // -----------------------------------------------------------------------

    #[test]
    fn write_reports_bytes_written() {
        let store = InMemoryObjectStore::new();
        let req = WriteRequest::new(oid("w"), 2, Payload::new(b"hello".to_vec()));
        let reply = handle_write(&store, &req);
        assert_eq!(reply.result, 5);
        assert_eq!(store.stat(&oid("w")).unwrap().size, 7);
    }

    #[test]
    fn write_uses_declared_length_prefix() {
        let store = InMemoryObjectStore::new();
        let req = WriteRequest {
            oid: oid("w"),
            length: 3,
            offset: 0,
            payload: Payload::new(b"abcdef".to_vec()),
        };
        assert_eq!(handle_write(&store, &req).result, 3);
        assert_eq!(store.read(&oid("w"), 10, 0).unwrap().as_slice(), b"abc");
    }

    #[test]
    fn write_length_beyond_buffer_is_einval() {
        let store = InMemoryObjectStore::new();
        let req = WriteRequest {
            oid: oid("w"),
            length: 10,
            offset: 0,
            payload: Payload::new(b"abc".to_vec()),
        };
        assert_eq!(handle_write(&store, &req).result, result::EINVAL);
        assert!(!store.exists(&oid("w")).unwrap());
    }

    #[test]
    fn write_failure_becomes_reply() {
        let req = WriteRequest::new(oid("w"), 0, Payload::new(b"data".to_vec()));
        let reply = handle_write(&BrokenStore, &req);
        assert_eq!(reply.result, result::EIO);
        assert_eq!(reply.oid, oid("w"));
    }

    #[test]
    fn write_unaddressable_offset_is_einval() {
        let store = InMemoryObjectStore::new();
        let req = WriteRequest::new(oid("w"), u64::MAX, Payload::new(b"x".to_vec()));
        assert_eq!(handle_write(&store, &req).result, result::EINVAL);
    }

    // -----------------------------------------------------------------------
    // Op
    // -----------------------------------------------------------------------

    #[test]
    fn stat_reports_size() {
        let store = store_with("s", b"twelve bytes");
        let reply = handle_op(&store, &OpRequest::new(oid("s"), OpCode::Stat));
        assert_eq!(reply.result, result::OK);
        assert_eq!(reply.size, 12);
    }

    #[test]
    fn stat_missing_is_enoent() {
        let store = InMemoryObjectStore::new();
        let reply = handle_op(&store, &OpRequest::new(oid("s"), OpCode::Stat));
        assert_eq!(reply.result, result::ENOENT);
        assert_eq!(reply.size, 0);
    }

    #[test]
    fn delete_then_stat_is_enoent() {
        let store = store_with("d", b"bye");
        let del = handle_op(&store, &OpRequest::new(oid("d"), OpCode::Delete));
        assert_eq!(del.result, result::OK);
        let stat = handle_op(&store, &OpRequest::new(oid("d"), OpCode::Stat));
        assert_eq!(stat.result, result::ENOENT);
    }

    #[test]
    fn delete_missing_is_enoent() {
        let store = InMemoryObjectStore::new();
        let reply = handle_op(&store, &OpRequest::new(oid("d"), OpCode::Delete));
        assert_eq!(reply.result, result::ENOENT);
    }

    #[test]
    fn unknown_op_is_eopnotsupp() {
        let store = store_with("u", b"x");
        let reply = handle_op(&store, &OpRequest { oid: oid("u"), op: 42 });
        assert_eq!(reply.result, result::EOPNOTSUPP);
        assert_eq!(reply.op, 42);
        assert!(store.exists(&oid("u")).unwrap());
    }

    #[test]
    fn op_store_failures_are_eio() {
        let stat = handle_op(&BrokenStore, &OpRequest::new(oid("b"), OpCode::Stat));
        let del = handle_op(&BrokenStore, &OpRequest::new(oid("b"), OpCode::Delete));
        assert_eq!(stat.result, result::EIO);
        assert_eq!(del.result, result::EIO);
    }
}
