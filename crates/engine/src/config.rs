//! Engine configuration and per-upload options.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tuskit_client::UploadOptions;
use tuskit_protocol::constants::{DEFAULT_CHUNK_SIZE, DEFAULT_REQUEST_PAYLOAD_SIZE};
use tuskit_protocol::encode_metadata;

use crate::error::UploadError;

/// Default interval of the progress tick, in milliseconds.
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 500;

/// Engine-wide settings. Every field has a default, so an empty JSON
/// document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bytes read from the source per chunk.
    pub chunk_size: usize,
    /// Upper bound of one request body.
    pub request_payload_size: usize,
    /// Re-emit the last confirmed offset this often. `0` disables it.
    pub progress_interval_ms: u64,
    /// Concurrently running uploads.
    pub workers: usize,
    /// Drop the resumption record once an upload succeeds.
    pub remove_fingerprint_on_success: bool,
    /// Resumption store file. `None` keeps records in memory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            request_payload_size: DEFAULT_REQUEST_PAYLOAD_SIZE,
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
            workers: default_workers(),
            remove_fingerprint_on_success: false,
            store_path: tuskit_store::default_store_path(),
        }
    }
}

impl EngineConfig {
    /// Period of the progress tick, if enabled.
    pub fn progress_interval(&self) -> Option<Duration> {
        (self.progress_interval_ms > 0).then(|| Duration::from_millis(self.progress_interval_ms))
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// What the host passes to `create_upload`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOptions {
    pub endpoint: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CreateOptions {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Validates endpoint and headers.
    /// Validates the endpoint, headers and metadata keys.
    pub(crate) fn upload_options(&self) -> Result<UploadOptions, UploadError> {
        let options = UploadOptions::new(&self.endpoint)?.with_headers(&self.headers)?;
        encode_metadata(&self.metadata).map_err(|e| UploadError::InvalidOption(e.to_string()))?;
        Ok(options)
    }
}
