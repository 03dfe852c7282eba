// src/object/chunks.rs

//! Chunked object reader
//!
//! Objects are hashed and uploaded in fixed-size chunks read into a single
//! reusable buffer. The reader owns the file handle, so no chunk can
//! outlive it.

use crate::progress::TransferProgress;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

/// Sequential chunk reader over an object's file
pub struct ObjectChunks {
    file: File,
    buffer: Vec<u8>,
    filled: usize,
    offset: usize,
    progress: Option<Arc<dyn TransferProgress>>,
}

impl ObjectChunks {
    pub(crate) fn open(path: &Path, chunk_size: usize) -> io::Result<Self> {
        Ok(Self {
            file: File::open(path)?,
            buffer: vec![0u8; chunk_size.max(1)],
            filled: 0,
            offset: 0,
            progress: None,
        })
    }

    /// Report one `object_read` event per chunk pulled from the file
    pub fn with_progress(mut self, progress: Arc<dyn TransferProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Next chunk of the file; only the last one may be shorter than the
    /// chunk size
    pub fn next_chunk(&mut self) -> io::Result<Option<&[u8]>> {
        let len = self.refill()?;
        if len == 0 {
            return Ok(None);
        }
        Ok(Some(&self.buffer[..len]))
    }

    fn refill(&mut self) -> io::Result<usize> {
        let len = read_full(&mut self.file, &mut self.buffer)?;
        self.filled = len;
        self.offset = len;
        if len > 0 {
            if let Some(progress) = &self.progress {
                progress.object_read();
            }
        }
        Ok(len)
    }
}

impl Read for ObjectChunks {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.offset >= self.filled {
            if self.refill()? == 0 {
                return Ok(0);
            }
            self.offset = 0;
        }
        let len = out.len().min(self.filled - self.offset);
        out[..len].copy_from_slice(&self.buffer[self.offset..self.offset + len]);
        self.offset += len;
        Ok(len)
    }
}

/// Fill `buffer` as far as the reader allows
pub(crate) fn read_full<R: Read>(reader: &mut R, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
