use osd_protocol::result::{self, ResultCode};
use osd_store::StoreError;
use osd_types::ObjectId;
use thiserror::Error;

/// Why a single request failed. Always reported to the peer, never fatal.
#[derive(Debug, Error)]
pub enum RequestError {
    /// Read/stat/delete against a missing object.
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    /// The store failed to complete the operation.
    #[error("store I/O error: {0}")]
    Io(String),

    /// Op code this daemon does not implement.
    #[error("unsupported op code {0}")]
    UnsupportedOp(u32),

    /// Request fields are inconsistent (e.g. length larger than the buffer).
    #[error("invalid request: {0}")]
    Invalid(String),
}

impl RequestError {
    /// Negative result code carried by the failure reply.
    pub fn result_code(&self) -> ResultCode {
        match self {
            Self::NotFound(_) => result::ENOENT,
            Self::Io(_) => result::EIO,
            Self::UnsupportedOp(_) => result::EOPNOTSUPP,
            Self::Invalid(_) => result::EINVAL,
        }
    }
}

impl From<StoreError> for RequestError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::InvalidRange { .. } => Self::Invalid(err.to_string()),
            StoreError::Io(e) => Self::Io(e.to_string()),
        }
    }
}

/// Daemon-level errors: configuration, startup, and transport.
#[derive(Debug, Error)]
pub enum OsdError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("messenger error: {0}")]
    Messenger(#[from] osd_messenger::MessengerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type OsdResult<T> = Result<T, OsdError>;
