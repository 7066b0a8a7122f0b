//! Signed result codes carried by replies.
//!
//! Non-negative values mean success (for reads and writes, the byte count);
//! negative values are errno-style failures.

pub type ResultCode = i64;

pub const OK: ResultCode = 0;
/// Object does not exist.
pub const ENOENT: ResultCode = -2;
/// Store I/O failure.
pub const EIO: ResultCode = -5;
/// Malformed request (e.g. declared length larger than the buffer).
pub const EINVAL: ResultCode = -22;
/// Reply would not fit in one frame.
pub const EMSGSIZE: ResultCode = -90;
/// Unrecognized op code.
pub const EOPNOTSUPP: ResultCode = -95;

pub fn is_success(code: ResultCode) -> bool {
    code >= 0
}

/// Human-readable name for a result code.
pub fn describe(code: ResultCode) -> &'static str {
    match code {
        c if c >= 0 => "ok",
        ENOENT => "no such object",
        EIO => "i/o error",
        EINVAL => "invalid argument",
        EMSGSIZE => "message too long",
        EOPNOTSUPP => "operation not supported",
        _ => "unknown error",
    }
}
