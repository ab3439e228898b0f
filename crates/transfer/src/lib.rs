//! Upload sources for resumable transfers.
//!
//! An [`UploadDescriptor`] pins down what is being uploaded (file, size,
//! metadata) and a [`SourceReader`] streams its bytes in bounded chunks
//! starting at any server-confirmed offset.

mod descriptor;
mod locator;
mod reader;

pub use descriptor::{UploadDescriptor, fingerprint};
pub use locator::resolve_locator;
pub use reader::SourceReader;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("source not found: {locator}: {reason}")]
    SourceNotFound { locator: String, reason: String },

    #[error("invalid locator: {0}")]
    InvalidLocator(String),

    #[error("source ended at byte {offset}, expected {expected} bytes")]
    UnexpectedEof { offset: u64, expected: u64 },

    #[error("offset {offset} is past the end of the source ({size} bytes)")]
    OffsetOutOfRange { offset: u64, size: u64 },
}
