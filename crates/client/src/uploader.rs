//! One bounded PATCH per call.

use tracing::debug;
use tuskit_protocol::constants::{
    DEFAULT_CHUNK_SIZE, HEADER_CONTENT_TYPE, HEADER_UPLOAD_OFFSET, OFFSET_OCTET_STREAM,
};
use tuskit_protocol::parse_offset;
use tuskit_transfer::SourceReader;

use crate::client::TusClient;
use crate::error::ClientError;
use crate::transport::Method;

/// Result of one [`ChunkUploader::upload_chunk`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// A chunk was accepted; the server now holds this many bytes. The
    /// chunk that completes the upload also lands here, with the total size.
    Advanced(u64),
    /// Nothing left to send: the offset already equals the total size. No
    /// request is made, so the call after the final `Advanced` is free.
    Done,
}

/// Streams source bytes into a session, one request per chunk.
pub struct ChunkUploader {
    client: TusClient,
    chunk_size: usize,
    request_payload_size: usize,
}

impl ChunkUploader {
    /// Creates an uploader reading at most `chunk_size` bytes per call and
    /// never sending a body larger than `request_payload_size`.
    ///
    /// A zero size falls back to [`DEFAULT_CHUNK_SIZE`].
    pub fn new(client: TusClient, chunk_size: usize, request_payload_size: usize) -> Self {
        let nonzero = |n: usize| if n == 0 { DEFAULT_CHUNK_SIZE } else { n };
        Self {
            client,
            chunk_size: nonzero(chunk_size),
            request_payload_size: nonzero(request_payload_size),
        }
    }

    /// Largest body this uploader sends.
    pub fn max_body_len(&self) -> usize {
        self.chunk_size.min(self.request_payload_size)
    }

    /// Sends the chunk starting at `offset` to the session at `url`.
    ///
    /// The reader is repositioned only if it is not already at `offset`
    /// (the first chunk after a resume). The server must acknowledge exactly
    /// `offset + sent` bytes; any other answer means someone else wrote to
    /// the session and fails with [`ClientError::OffsetMismatch`].
    ///
    /// Callers loop until [`ChunkOutcome::Done`], which costs one extra call
    /// after the last chunk and no I/O.
    pub async fn upload_chunk(
        &self,
        url: &str,
        offset: u64,
        reader: &mut SourceReader,
    ) -> Result<ChunkOutcome, ClientError> {
        if offset >= reader.total_size() {
            return Ok(ChunkOutcome::Done);
        }
        if reader.offset() != offset {
            reader.seek_to(offset).await?;
        }

        let body = reader.read_chunk(self.max_body_len()).await?;
        let sent = body.len() as u64;
        let expected = offset + sent;

        let request = self
            .client
            .request(Method::Patch, url)
            .header(HEADER_CONTENT_TYPE, OFFSET_OCTET_STREAM)
            .header(HEADER_UPLOAD_OFFSET, offset.to_string())
            .body(body);
        let response = self.client.send(request, "chunk upload").await?;

        let actual = parse_offset(response.header_value(HEADER_UPLOAD_OFFSET))?;
        if actual != expected {
            return Err(ClientError::OffsetMismatch { expected, actual });
        }

        debug!(url = %url, offset = actual, sent, "chunk accepted");
        Ok(ChunkOutcome::Advanced(actual))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryServer;
    use crate::options::UploadOptions;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Arc;
    use tuskit_store::MemoryUrlStore;
    use tuskit_transfer::UploadDescriptor;

    fn setup(dir: &Path, data: &[u8]) -> (Arc<MemoryServer>, TusClient, UploadDescriptor) {
        let path = dir.join("source.bin");
        std::fs::write(&path, data).unwrap();
        let desc = UploadDescriptor::open(path.to_str().unwrap(), HashMap::new()).unwrap();
        let server = Arc::new(MemoryServer::new());
        let client = TusClient::new(
            server.clone(),
            Arc::new(MemoryUrlStore::new()),
            UploadOptions::new("http://tus.test/files/").unwrap(),
        );
        (server, client, desc)
    }

    #[tokio::test]
    async fn uploads_until_done() {
        let dir = tempfile::tempdir().unwrap();
        let (server, client, desc) = setup(dir.path(), b"0123456789");
        let session = client.create_session(&desc).await.unwrap();
        let uploader = client.uploader(4, 1024);
        let mut reader = desc.reader().await.unwrap();

        let mut offset = 0;
        let mut offsets = Vec::new();
        while let ChunkOutcome::Advanced(next) = uploader
            .upload_chunk(&session.url, offset, &mut reader)
            .await
            .unwrap()
        {
            offsets.push(next);
            offset = next;
        }

        assert_eq!(offsets, vec![4, 8, 10]);
        assert_eq!(server.upload(&session.url).unwrap().data, b"0123456789");
        assert_eq!(server.count(Method::Patch), 3);
    }

    #[tokio::test]
    async fn final_chunk_advances_then_done_is_free() {
        let dir = tempfile::tempdir().unwrap();
        let (server, client, desc) = setup(dir.path(), b"012345");
        let session = client.create_session(&desc).await.unwrap();
        let uploader = client.uploader(6, 1024);
        let mut reader = desc.reader().await.unwrap();

        let outcome = uploader
            .upload_chunk(&session.url, 0, &mut reader)
            .await
            .unwrap();
        assert_eq!(outcome, ChunkOutcome::Advanced(6));
        let sent = server.requests().len();

        let outcome = uploader
            .upload_chunk(&session.url, 6, &mut reader)
            .await
            .unwrap();
        assert_eq!(outcome, ChunkOutcome::Done);
        assert_eq!(server.requests().len(), sent);
        assert_eq!(server.count(Method::Patch), 1);
    }

    #[tokio::test]
    async fn request_payload_caps_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let (server, client, desc) = setup(dir.path(), b"0123456789");
        let session = client.create_session(&desc).await.unwrap();
        let uploader = client.uploader(8, 3);
        assert_eq!(uploader.max_body_len(), 3);

        let mut reader = desc.reader().await.unwrap();
        let outcome = uploader
            .upload_chunk(&session.url, 0, &mut reader)
            .await
            .unwrap();
        assert_eq!(outcome, ChunkOutcome::Advanced(3));

        let patch = server
            .requests()
            .into_iter()
            .find(|r| r.method == Method::Patch)
            .unwrap();
        assert_eq!(patch.body.len(), 3);
        assert_eq!(patch.header_value("Upload-Offset"), Some("0"));
        assert_eq!(
            patch.header_value("Content-Type"),
            Some("application/offset+octet-stream")
        );
    }

    #[tokio::test]
    async fn resumes_from_nonzero_offset() {
        let dir = tempfile::tempdir().unwrap();
        let (server, client, desc) = setup(dir.path(), b"0123456789");
        let session = client.create_session(&desc).await.unwrap();
        server.preload(&session.url, b"012345");

        let uploader = client.uploader(100, 100);
        let mut reader = desc.reader().await.unwrap();
        let outcome = uploader
            .upload_chunk(&session.url, 6, &mut reader)
            .await
            .unwrap();

        assert_eq!(outcome, ChunkOutcome::Advanced(10));
        assert_eq!(server.upload(&session.url).unwrap().data, b"0123456789");
    }

    #[tokio::test]
    async fn misreported_offset_is_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let (server, client, desc) = setup(dir.path(), b"0123456789");
        let session = client.create_session(&desc).await.unwrap();
        server.misreport_next_offset(7);

        let uploader = client.uploader(4, 4);
        let mut reader = desc.reader().await.unwrap();
        let err = uploader
            .upload_chunk(&session.url, 0, &mut reader)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::OffsetMismatch {
                expected: 4,
                actual: 7
            }
        ));
    }

    #[tokio::test]
    async fn conflicting_write_is_protocol_error() {
        let dir = tempfile::tempdir().unwrap();
        let (server, client, desc) = setup(dir.path(), b"0123456789");
        let session = client.create_session(&desc).await.unwrap();
        // Someone else advanced the session behind our back.
        server.set_offset(&session.url, 2);

        let uploader = client.uploader(4, 4);
        let mut reader = desc.reader().await.unwrap();
        let err = uploader
            .upload_chunk(&session.url, 0, &mut reader)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(409));
    }

    #[tokio::test]
    async fn empty_source_is_done_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let (server, client, desc) = setup(dir.path(), b"");
        let session = client.create_session(&desc).await.unwrap();

        let uploader = client.uploader(4, 4);
        let mut reader = desc.reader().await.unwrap();
        let outcome = uploader
            .upload_chunk(&session.url, 0, &mut reader)
            .await
            .unwrap();
        assert_eq!(outcome, ChunkOutcome::Done);
        assert_eq!(server.count(Method::Patch), 0);
    }
}
