use std::collections::HashMap;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::{SourceReader, TransferError, resolve_locator};

/// Immutable description of one upload source.
///
/// Built once per upload and shared by the session-creation request (size
/// and metadata) and the resume check (size must match the server's).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadDescriptor {
    locator: String,
    path: PathBuf,
    total_size: u64,
    metadata: HashMap<String, String>,
}

impl UploadDescriptor {
    /// Opens the source behind `locator` and records its size.
    ///
    /// The size is taken from the file's metadata up front because the
    /// creation request has to declare it.
    pub fn open(
        locator: &str,
        metadata: HashMap<String, String>,
    ) -> Result<Self, TransferError> {
        let resolved = resolve_locator(locator)?;
        let not_found = |e: std::io::Error| TransferError::SourceNotFound {
            locator: locator.to_string(),
            reason: e.to_string(),
        };

        // Opening (not just stat-ing) catches permission problems early.
        let file = std::fs::File::open(&resolved).map_err(not_found)?;
        let meta = file.metadata().map_err(not_found)?;
        if !meta.is_file() {
            return Err(TransferError::SourceNotFound {
                locator: locator.to_string(),
                reason: "not a regular file".into(),
            });
        }
        let path = std::fs::canonicalize(&resolved).map_err(not_found)?;

        debug!(path = %path.display(), size = meta.len(), "opened upload source");

        Ok(Self {
            locator: locator.to_string(),
            path,
            total_size: meta.len(),
            metadata,
        })
    }

    /// Locator exactly as the host supplied it.
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Canonical path of the source file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total number of bytes to upload.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Metadata sent with the creation request.
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// Fingerprint of this source when uploaded to `endpoint`.
    pub fn fingerprint(&self, endpoint: &str) -> String {
        fingerprint(endpoint, &self.path, self.total_size)
    }

    /// Opens a fresh sequential reader positioned at byte 0.
    pub async fn reader(&self) -> Result<SourceReader, TransferError> {
        SourceReader::open(&self.path, self.total_size).await
    }
}

/// Derives the key identifying "the same logical upload" across restarts.
///
/// Hex SHA-256 over endpoint, canonical path and size, so a modified file
/// (different size) or a different server never reuses a session.
pub fn fingerprint(endpoint: &str, path: &Path, size: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(endpoint.as_bytes());
    hasher.update(b"\n");
    hasher.update(path.to_string_lossy().as_bytes());
    hasher.update(b"\n");
    hasher.update(size.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn create_test_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(data).unwrap();
        path
    }

    #[test]
    fn open_records_size_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = create_test_file(dir.path(), "clip.bin", b"0123456789");

        let mut meta = HashMap::new();
        meta.insert("filename".to_string(), "clip.bin".to_string());
        let desc = UploadDescriptor::open(path.to_str().unwrap(), meta).unwrap();

        assert_eq!(desc.total_size(), 10);
        assert_eq!(desc.metadata()["filename"], "clip.bin");
        assert_eq!(desc.locator(), path.to_str().unwrap());
    }

    #[test]
    fn open_missing_file_is_source_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.bin");
        let err = UploadDescriptor::open(missing.to_str().unwrap(), HashMap::new()).unwrap_err();
        assert!(matches!(err, TransferError::SourceNotFound { .. }));
    }

    #[test]
    fn open_directory_is_source_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = UploadDescriptor::open(dir.path().to_str().unwrap(), HashMap::new()).unwrap_err();
        assert!(matches!(err, TransferError::SourceNotFound { .. }));
    }

    #[test]
    fn file_url_and_path_share_a_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let path = create_test_file(dir.path(), "same.bin", b"abc");
        let path_str = path.to_str().unwrap();

        let by_path = UploadDescriptor::open(path_str, HashMap::new()).unwrap();
        let by_url = UploadDescriptor::open(&format!("file://{path_str}"), HashMap::new()).unwrap();

        assert_eq!(
            by_path.fingerprint("https://tus.example/files/"),
            by_url.fingerprint("https://tus.example/files/")
        );
    }

    #[test]
    fn fingerprint_depends_on_endpoint_and_size() {
        let path = Path::new("/data/a.bin");
        let base = fingerprint("https://a/files/", path, 10);
        assert_eq!(base.len(), 64);
        assert_eq!(base, fingerprint("https://a/files/", path, 10));
        assert_ne!(base, fingerprint("https://b/files/", path, 10));
        assert_ne!(base, fingerprint("https://a/files/", path, 11));
    }

    #[tokio::test]
    async fn reader_starts_at_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = create_test_file(dir.path(), "r.bin", b"hello");
        let desc = UploadDescriptor::open(path.to_str().unwrap(), HashMap::new()).unwrap();

        let reader = desc.reader().await.unwrap();
        assert_eq!(reader.offset(), 0);
        assert_eq!(reader.remaining(), 5);
    }
}
