/// Protocol version sent in every `Tus-Resumable` header.
pub const TUS_VERSION: &str = "1.0.0";

/// Version header required on every request and response.
pub const HEADER_TUS_RESUMABLE: &str = "Tus-Resumable";

/// Byte offset of the upload, sent with PATCH and returned by HEAD/PATCH.
pub const HEADER_UPLOAD_OFFSET: &str = "Upload-Offset";

/// Declared total size of the upload, sent with POST and returned by HEAD.
pub const HEADER_UPLOAD_LENGTH: &str = "Upload-Length";

/// Comma-separated `key base64(value)` pairs sent with POST.
pub const HEADER_UPLOAD_METADATA: &str = "Upload-Metadata";

/// Session URL returned by the creation request.
pub const HEADER_LOCATION: &str = "Location";

/// Content type header name.
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";

/// Content type required on PATCH bodies.
pub const OFFSET_OCTET_STREAM: &str = "application/offset+octet-stream";

/// Default amount of source data read for one chunk: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Default upper bound on a single PATCH body: 10 MiB.
pub const DEFAULT_REQUEST_PAYLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Status codes that mean the server no longer knows the session.
pub const SESSION_GONE_STATUSES: [u16; 2] = [404, 410];
