//! Host-facing upload events and the sinks that deliver them.

use serde::Serialize;
use tokio::sync::mpsc;

/// Event emitted to the host. Serializes to the bridge shape
/// `{"type": "onProgress", "uploadId": ..., ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum UploadEvent {
    #[serde(rename = "onProgress", rename_all = "camelCase")]
    Progress {
        upload_id: String,
        bytes_written: u64,
        bytes_total: u64,
    },
    #[serde(rename = "onSuccess", rename_all = "camelCase")]
    Success { upload_id: String, upload_url: String },
    #[serde(rename = "onError", rename_all = "camelCase")]
    Error { upload_id: String, error: String },
}

impl UploadEvent {
    pub fn upload_id(&self) -> &str {
        match self {
            Self::Progress { upload_id, .. }
            | Self::Success { upload_id, .. }
            | Self::Error { upload_id, .. } => upload_id,
        }
    }

    /// Whether this event ends the upload.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }
}

/// Receives upload events. Must not block: it is called from upload tasks.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: UploadEvent);
}

impl EventSink for mpsc::UnboundedSender<UploadEvent> {
    fn emit(&self, event: UploadEvent) {
        // A closed receiver means the host stopped listening.
        let _ = self.send(event);
    }
}

/// Adapts a closure into an [`EventSink`].
pub struct CallbackSink<F>(F);

impl<F> CallbackSink<F>
where
    F: Fn(UploadEvent) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self(callback)
    }
}

impl<F> EventSink for CallbackSink<F>
where
    F: Fn(UploadEvent) + Send + Sync,
{
    fn emit(&self, event: UploadEvent) {
        (self.0)(event)
    }
}
