use std::io::SeekFrom;
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::TransferError;

/// Reads an upload source sequentially in bounded chunks.
///
/// The reader tracks its own byte offset. Callers reposition it only when
/// a session is resumed at a server-confirmed offset; after that, chunks are
/// read back to back without seeking.
pub struct SourceReader {
    file: File,
    offset: u64,
    total_size: u64,
}

impl SourceReader {
    /// Opens `path` for chunked reading. `total_size` is the size recorded
    /// when the upload was described.
    pub async fn open(path: &Path, total_size: u64) -> Result<Self, TransferError> {
        let file = File::open(path).await?;
        Ok(Self {
            file,
            offset: 0,
            total_size,
        })
    }

    /// Seeks to the given byte offset (for resume).
    pub async fn seek_to(&mut self, offset: u64) -> Result<(), TransferError> {
        if offset > self.total_size {
            return Err(TransferError::OffsetOutOfRange {
                offset,
                size: self.total_size,
            });
        }
        self.file.seek(SeekFrom::Start(offset)).await?;
        self.offset = offset;
        Ok(())
    }

    /// Reads the next chunk of at most `max_len` bytes.
    ///
    /// Returns an empty buffer once the declared size has been consumed.
    /// A source that ends before its declared size is an error: sending a
    /// short upload would leave the session permanently incomplete.
    pub async fn read_chunk(&mut self, max_len: usize) -> Result<Vec<u8>, TransferError> {
        let remaining = self.remaining();
        let want = remaining.min(max_len as u64) as usize;
        let mut buf = vec![0u8; want];

        let mut filled = 0;
        while filled < want {
            let n = self.file.read(&mut buf[filled..]).await?;
            if n == 0 {
                return Err(TransferError::UnexpectedEof {
                    offset: self.offset + filled as u64,
                    expected: self.total_size,
                });
            }
            filled += n;
        }

        self.offset += filled as u64;
        Ok(buf)
    }

    /// Current byte offset.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Total source size in bytes.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Bytes remaining to read.
    pub fn remaining(&self) -> u64 {
        self.total_size.saturating_sub(self.offset)
    }
}
