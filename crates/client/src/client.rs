//! Session creation, resumption and finalization.

use std::sync::Arc;

use tracing::{debug, info, warn};
use tuskit_protocol::constants::{
    HEADER_LOCATION, HEADER_TUS_RESUMABLE, HEADER_UPLOAD_LENGTH, HEADER_UPLOAD_METADATA,
    HEADER_UPLOAD_OFFSET, TUS_VERSION,
};
use tuskit_protocol::{ProtocolError, encode_metadata, parse_length, parse_offset};
use tuskit_store::UrlStore;
use tuskit_transfer::UploadDescriptor;

use crate::error::ClientError;
use crate::options::UploadOptions;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method};
use crate::uploader::ChunkUploader;

/// A server-side upload session as seen by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Absolute session URL. Fixed for the life of the upload.
    pub url: String,
    /// Last offset confirmed by the server.
    pub offset: u64,
    /// Declared total length.
    pub total_size: u64,
}

impl Session {
    /// Whether every byte has been confirmed.
    pub fn is_complete(&self) -> bool {
        self.offset >= self.total_size
    }
}

/// Talks the tus creation and resume protocol for one endpoint.
///
/// Errors are never retried here. Network failures surface as
/// [`ClientError::Transport`], non-2xx answers as [`ClientError::Protocol`].
#[derive(Clone)]
pub struct TusClient {
    transport: Arc<dyn HttpTransport>,
    store: Arc<dyn UrlStore>,
    options: UploadOptions,
}

impl TusClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn UrlStore>,
        options: UploadOptions,
    ) -> Self {
        Self {
            transport,
            store,
            options,
        }
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    /// Builds a chunk uploader sharing this client's transport and headers.
    pub fn uploader(&self, chunk_size: usize, request_payload_size: usize) -> ChunkUploader {
        ChunkUploader::new(self.clone(), chunk_size, request_payload_size)
    }

    /// Fingerprint under which `descriptor`'s session URL is stored.
    pub fn fingerprint(&self, descriptor: &UploadDescriptor) -> String {
        descriptor.fingerprint(self.options.endpoint().as_str())
    }

    /// Creates a new session and remembers its URL.
    pub async fn create_session(
        &self,
        descriptor: &UploadDescriptor,
    ) -> Result<Session, ClientError> {
        let mut request = self
            .request(Method::Post, self.options.endpoint().as_str())
            .header(HEADER_UPLOAD_LENGTH, descriptor.total_size().to_string());
        if let Some(metadata) = encode_metadata(descriptor.metadata())
            .map_err(|e| ClientError::InvalidHeader(e.to_string()))?
        {
            request = request.header(HEADER_UPLOAD_METADATA, metadata);
        }

        let response = self.send(request, "create").await?;
        let location = response
            .header_value(HEADER_LOCATION)
            .ok_or(ProtocolError::MissingHeader(HEADER_LOCATION))?;
        let url = self
            .options
            .endpoint()
            .join(location)
            .map_err(|_| ProtocolError::InvalidHeader {
                name: HEADER_LOCATION,
                value: location.to_string(),
            })?
            .to_string();

        info!(url = %url, size = descriptor.total_size(), "created upload session");

        // Losing the record only costs resumability, not this upload.
        let fingerprint = self.fingerprint(descriptor);
        if let Err(e) = self.store.put(&fingerprint, &url) {
            warn!(url = %url, error = %e, "failed to persist session URL");
        }

        Ok(Session {
            url,
            offset: 0,
            total_size: descriptor.total_size(),
        })
    }

    /// Asks the server where the session at `url` stands.
    ///
    /// Fails with [`ClientError::SizeMismatch`] when the remote length or
    /// offset cannot belong to `descriptor`.
    pub async fn resume_session(
        &self,
        url: &str,
        descriptor: &UploadDescriptor,
    ) -> Result<Session, ClientError> {
        let response = self.send(self.request(Method::Head, url), "resume").await?;

        let local = descriptor.total_size();
        if let Some(raw) = response.header_value(HEADER_UPLOAD_LENGTH) {
            let remote = parse_length(Some(raw))?;
            if remote != local {
                return Err(ClientError::SizeMismatch { local, remote });
            }
        }

        let offset = parse_offset(response.header_value(HEADER_UPLOAD_OFFSET))?;
        if offset > local {
            return Err(ClientError::SizeMismatch {
                local,
                remote: offset,
            });
        }

        debug!(url = %url, offset, size = local, "resumed upload session");
        Ok(Session {
            url: url.to_string(),
            offset,
            total_size: local,
        })
    }

    /// Resumes the stored session for `descriptor`, or creates a new one.
    ///
    /// A stored session the server no longer recognises (404, 410, or a
    /// length/offset that does not fit) is replaced by a fresh session
    /// starting at offset 0. Any other failure is returned as-is.
    pub async fn resume_or_create(
        &self,
        descriptor: &UploadDescriptor,
    ) -> Result<Session, ClientError> {
        let fingerprint = self.fingerprint(descriptor);

        if let Some(url) = self.store.get(&fingerprint) {
            match self.resume_session(&url, descriptor).await {
                Ok(session) => return Ok(session),
                Err(e) if e.is_stale_session() => {
                    warn!(url = %url, error = %e, "stored session unusable, creating a new one");
                }
                Err(e) => return Err(e),
            }
        }

        self.create_session(descriptor).await
    }

    /// Confirms that the server holds exactly `session.offset` bytes.
    ///
    /// Called when the chunk loop stops, whether finished or aborted, so that
    /// no chunk boundary is left unconfirmed.
    pub async fn finish(&self, session: &Session) -> Result<(), ClientError> {
        let response = self
            .send(self.request(Method::Head, &session.url), "finish")
            .await?;
        let remote = parse_offset(response.header_value(HEADER_UPLOAD_OFFSET))?;
        if remote != session.offset {
            return Err(ClientError::OffsetMismatch {
                expected: session.offset,
                actual: remote,
            });
        }
        debug!(url = %session.url, offset = remote, "session finalized");
        Ok(())
    }

    /// Drops the stored session URL for `descriptor`.
    pub fn forget(&self, descriptor: &UploadDescriptor) -> Result<(), ClientError> {
        self.store.remove(&self.fingerprint(descriptor))?;
        Ok(())
    }

    /// Starts a request carrying the protocol version and user headers.
    pub(crate) fn request(&self, method: Method, url: &str) -> HttpRequest {
        let mut request =
            HttpRequest::new(method, url).header(HEADER_TUS_RESUMABLE, TUS_VERSION);
        for (name, value) in self.options.headers() {
            request = request.header(name.as_str(), value.as_str());
        }
        request
    }

    /// Sends `request`, mapping non-2xx statuses to protocol errors.
    pub(crate) async fn send(
        &self,
        request: HttpRequest,
        operation: &'static str,
    ) -> Result<HttpResponse, ClientError> {
        debug!(method = request.method.as_str(), url = %request.url, "sending {operation} request");
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(ClientError::Protocol {
                status: response.status,
                operation,
            });
        }
        Ok(response)
    }
}
