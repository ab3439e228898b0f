//! Wire-level pieces of the tus 1.0.0 resumable upload protocol.
//!
//! Nothing here performs I/O. The client crate builds requests from these
//! constants and parses responses with the helpers below.

pub mod constants;
pub mod headers;
pub mod metadata;

pub use constants::TUS_VERSION;
pub use headers::{parse_length, parse_offset};
pub use metadata::{decode_metadata, encode_metadata};

/// Errors produced while encoding or decoding protocol headers.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("missing header: {0}")]
    MissingHeader(&'static str),

    #[error("invalid {name} header: {value:?}")]
    InvalidHeader { name: &'static str, value: String },

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),
}
