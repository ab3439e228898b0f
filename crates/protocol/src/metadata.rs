//! `Upload-Metadata` header codec.
//!
//! The header is a comma-separated list of `key base64(value)` pairs. Keys
//! may not contain spaces or commas; values are arbitrary UTF-8 and are
//! encoded with the standard padded base64 alphabet.

use std::collections::HashMap;

use base64::{Engine, engine::general_purpose::STANDARD};

use crate::ProtocolError;

/// Encodes metadata into an `Upload-Metadata` header value.
///
/// Returns `Ok(None)` for empty metadata so callers can omit the header.
/// Pairs are emitted in key order so the header is deterministic.
pub fn encode_metadata(metadata: &HashMap<String, String>) -> Result<Option<String>, ProtocolError> {
    if metadata.is_empty() {
        return Ok(None);
    }

    let mut keys: Vec<&String> = metadata.keys().collect();
    keys.sort();

    let mut pairs = Vec::with_capacity(keys.len());
    for key in keys {
        if key.is_empty() || key.contains([' ', ',']) {
            return Err(ProtocolError::InvalidMetadata(format!(
                "key {key:?} must be non-empty and contain no spaces or commas"
            )));
        }
        let value = &metadata[key];
        if value.is_empty() {
            pairs.push(key.clone());
        } else {
            pairs.push(format!("{key} {}", STANDARD.encode(value.as_bytes())));
        }
    }

    Ok(Some(pairs.join(",")))
}

/// Decodes an `Upload-Metadata` header value.
pub fn decode_metadata(header: &str) -> Result<HashMap<String, String>, ProtocolError> {
    let mut metadata = HashMap::new();

    for pair in header.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, encoded) = match pair.split_once(' ') {
            Some((k, v)) => (k, v.trim()),
            None => (pair, ""),
        };

        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| ProtocolError::InvalidMetadata(format!("{key}: {e}")))?;
        let value = String::from_utf8(bytes)
            .map_err(|_| ProtocolError::InvalidMetadata(format!("{key}: value is not UTF-8")))?;

        metadata.insert(key.to_string(), value);
    }

    Ok(metadata)
}
