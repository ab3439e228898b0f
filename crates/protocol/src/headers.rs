//! Parsing of numeric tus headers.

use crate::ProtocolError;
use crate::constants::{HEADER_UPLOAD_LENGTH, HEADER_UPLOAD_OFFSET};

/// Parses an `Upload-Offset` header value.
///
/// `None` means the server omitted the header, which the protocol forbids
/// on HEAD and PATCH responses.
pub fn parse_offset(value: Option<&str>) -> Result<u64, ProtocolError> {
    parse_u64(HEADER_UPLOAD_OFFSET, value)
}

/// Parses an `Upload-Length` header value.
pub fn parse_length(value: Option<&str>) -> Result<u64, ProtocolError> {
    parse_u64(HEADER_UPLOAD_LENGTH, value)
}

fn parse_u64(name: &'static str, value: Option<&str>) -> Result<u64, ProtocolError> {
    let raw = value.ok_or(ProtocolError::MissingHeader(name))?;
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ProtocolError::InvalidHeader {
            name,
            value: raw.to_string(),
        })
}
