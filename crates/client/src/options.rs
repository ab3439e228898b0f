//! Per-upload connection options.

use std::collections::HashMap;

use reqwest::Url;
use reqwest::header::{HeaderName, HeaderValue};
use tuskit_protocol::constants::{
    HEADER_CONTENT_TYPE, HEADER_TUS_RESUMABLE, HEADER_UPLOAD_LENGTH, HEADER_UPLOAD_METADATA,
    HEADER_UPLOAD_OFFSET,
};

use crate::ClientError;

/// Headers the client sets itself.
const RESERVED_HEADERS: [&str; 5] = [
    HEADER_TUS_RESUMABLE,
    HEADER_UPLOAD_OFFSET,
    HEADER_UPLOAD_LENGTH,
    HEADER_UPLOAD_METADATA,
    HEADER_CONTENT_TYPE,
];

/// Where to create sessions and which extra headers to send.
///
/// Validated when built: the endpoint must be an absolute `http(s)` URL and
/// every header must be a legal HTTP header that the protocol does not
/// already own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    endpoint: Url,
    headers: HashMap<String, String>,
}

impl UploadOptions {
    /// Creates options for `endpoint` with no extra headers.
    pub fn new(endpoint: &str) -> Result<Self, ClientError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| ClientError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ClientError::InvalidEndpoint(format!(
                "{endpoint}: scheme must be http or https"
            )));
        }
        if endpoint.host_str().is_none() {
            return Err(ClientError::InvalidEndpoint(format!(
                "{endpoint}: missing host"
            )));
        }
        Ok(Self {
            endpoint,
            headers: HashMap::new(),
        })
    }

    /// Adds one header sent with every request of this upload.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, ClientError> {
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ClientError::InvalidHeader(format!("bad name {name:?}")))?;
        if RESERVED_HEADERS
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(name))
        {
            return Err(ClientError::InvalidHeader(format!(
                "{name} is set by the client"
            )));
        }
        HeaderValue::from_str(value)
            .map_err(|_| ClientError::InvalidHeader(format!("bad value for {name}")))?;
        self.headers.insert(name.to_string(), value.to_string());
        Ok(self)
    }

    /// Adds every header of `headers`.
    pub fn with_headers(mut self, headers: &HashMap<String, String>) -> Result<Self, ClientError> {
        for (name, value) in headers {
            self = self.with_header(name, value)?;
        }
        Ok(self)
    }

    /// Creation endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Extra request headers.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }
}
