//! Engine error types.

use tuskit_client::ClientError;
use tuskit_transfer::TransferError;

/// Errors surfaced to the host, either synchronously from a command or as
/// the `error` field of an `onError` event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    #[error("source not found: {0}")]
    SourceNotFound(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("server answered {status} to {operation}")]
    Protocol { status: u16, operation: String },

    #[error("malformed server response: {0}")]
    Response(String),

    #[error("server offset {actual} does not match local offset {expected}")]
    OffsetMismatch { expected: u64, actual: u64 },

    #[error("source read failed: {0}")]
    Source(String),

    #[error("resumption store error: {0}")]
    Store(String),

    #[error("unknown upload: {0}")]
    UnknownUpload(String),
}

impl UploadError {
    /// HTTP status of a protocol failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Protocol { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<TransferError> for UploadError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::SourceNotFound { .. } | TransferError::InvalidLocator(_) => {
                Self::SourceNotFound(e.to_string())
            }
            other => Self::Source(other.to_string()),
        }
    }
}

impl From<ClientError> for UploadError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::InvalidEndpoint(msg) => Self::InvalidEndpoint(msg),
            ClientError::InvalidHeader(msg) => Self::InvalidOption(msg),
            ClientError::Transport(e) => Self::Transport(e.to_string()),
            ClientError::Protocol { status, operation } => Self::Protocol {
                status,
                operation: operation.to_string(),
            },
            ClientError::Response(e) => Self::Response(e.to_string()),
            ClientError::OffsetMismatch { expected, actual } => {
                Self::OffsetMismatch { expected, actual }
            }
            // Only reachable if a stale session slips past the resume fallback.
            e @ ClientError::SizeMismatch { .. } => Self::Response(e.to_string()),
            ClientError::Source(e) => e.into(),
            ClientError::Store(e) => Self::Store(e.to_string()),
        }
    }
}

impl From<tuskit_store::StoreError> for UploadError {
    fn from(e: tuskit_store::StoreError) -> Self {
        Self::Store(e.to_string())
    }
}
