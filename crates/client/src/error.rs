//! Client error types.

use crate::transport::TransportError;

/// Errors produced while talking to a tus server.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("{operation} failed with status {status}")]
    Protocol { status: u16, operation: &'static str },

    #[error("malformed response: {0}")]
    Response(#[from] tuskit_protocol::ProtocolError),

    #[error("server offset {actual} does not match local offset {expected}")]
    OffsetMismatch { expected: u64, actual: u64 },

    #[error("remote upload length {remote} does not match local size {local}")]
    SizeMismatch { local: u64, remote: u64 },

    #[error("source error: {0}")]
    Source(#[from] tuskit_transfer::TransferError),

    #[error("store error: {0}")]
    Store(#[from] tuskit_store::StoreError),
}

impl ClientError {
    /// Status code carried by a protocol-level failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Protocol { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether a stored session should be abandoned in favour of a new one.
    ///
    /// True when the server has forgotten the session (404/410) or describes
    /// an upload that cannot be the one we are sending.
    pub fn is_stale_session(&self) -> bool {
        match self {
            Self::Protocol { status, .. } => {
                tuskit_protocol::constants::SESSION_GONE_STATUSES.contains(status)
            }
            Self::SizeMismatch { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gone_sessions_are_stale() {
        for status in [404, 410] {
            let err = ClientError::Protocol {
                status,
                operation: "HEAD",
            };
            assert!(err.is_stale_session());
            assert_eq!(err.status(), Some(status));
        }
    }

    #[test]
    fn other_failures_are_not_stale() {
        let server_error = ClientError::Protocol {
            status: 500,
            operation: "HEAD",
        };
        assert!(!server_error.is_stale_session());
        assert!(!ClientError::Transport(TransportError::new("reset")).is_stale_session());
        assert!(ClientError::SizeMismatch { local: 1, remote: 2 }.is_stale_session());
    }
}
