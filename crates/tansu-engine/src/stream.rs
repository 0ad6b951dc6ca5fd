//! Pull-based byte sources for streaming writes and lazy reads.
//!
//! [`ByteStream`] is the engine's one async seam: `write_file_from` pulls
//! buffers of arbitrary size until exhaustion, suspending only between
//! pulls. Futures here are deliberately `!Send`: the engine lives inside a
//! single-threaded actor, so streams run under a local executor the same way
//! the host drives the rest of the instance.

use std::collections::VecDeque;

use async_trait::async_trait;

use crate::engine::FsEngine;
use crate::error::FsResult;
use crate::store::SqlStore;

/// A consumable sequence of byte buffers with explicit end-of-stream.
#[async_trait(?Send)]
pub trait ByteStream {
    /// Pull the next buffer; `Ok(None)` means the stream is exhausted.
    ///
    /// Buffers may be any size, including empty; the engine never assumes a
    /// particular granularity.
    async fn next_chunk(&mut self) -> FsResult<Option<Vec<u8>>>;
}

/// Replays an in-memory sequence of buffers.
#[derive(Debug, Default)]
pub struct BufferStream {
    bufs: VecDeque<Vec<u8>>,
}

impl BufferStream {
    /// Stream that yields each buffer in order, then ends.
    pub fn new(bufs: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self {
            bufs: bufs.into_iter().collect(),
        }
    }

    /// Stream that yields one buffer, then ends.
    pub fn single(buf: impl Into<Vec<u8>>) -> Self {
        Self::new([buf.into()])
    }
}

#[async_trait(?Send)]
impl ByteStream for BufferStream {
    async fn next_chunk(&mut self) -> FsResult<Option<Vec<u8>>> {
        Ok(self.bufs.pop_front())
    }
}

/// Channel-fed stream: each received buffer is one pull; a closed channel is
/// end-of-stream. This is the adapter boundary for uploads arriving over the
/// wire.
#[async_trait(?Send)]
impl ByteStream for tokio::sync::mpsc::Receiver<Vec<u8>> {
    async fn next_chunk(&mut self) -> FsResult<Option<Vec<u8>>> {
        Ok(self.recv().await)
    }
}

/// Lazy whole-file reader: pulls one chunk-sized buffer per call straight
/// from the chunk rows, zero-filling sparse regions.
pub struct FileReader<'a, S: SqlStore> {
    fs: &'a FsEngine<S>,
    ino: u64,
    pos: u64,
    end: u64,
}

impl<'a, S: SqlStore> FileReader<'a, S> {
    pub(crate) fn new(fs: &'a FsEngine<S>, ino: u64, end: u64) -> Self {
        Self {
            fs,
            ino,
            pos: 0,
            end,
        }
    }

    /// Bytes remaining to be pulled.
    pub fn remaining(&self) -> u64 {
        self.end - self.pos
    }
}

#[async_trait(?Send)]
impl<S: SqlStore> ByteStream for FileReader<'_, S> {
    async fn next_chunk(&mut self) -> FsResult<Option<Vec<u8>>> {
        if self.pos >= self.end {
            return Ok(None);
        }
        let len = (self.end - self.pos).min(self.fs.chunk_size());
        let buf = self.fs.read_range(self.ino, self.pos, Some(len))?;
        self.pos += len;
        Ok(Some(buf))
    }
}

/// Drain a stream into one buffer. Convenience for callers that want the
/// lazy reader's contents without driving the pulls themselves.
pub async fn collect(stream: &mut impl ByteStream) -> FsResult<Vec<u8>> {
    let mut out = Vec::new();
    while let Some(buf) = stream.next_chunk().await? {
        out.extend_from_slice(&buf);
    }
    Ok(out)
}
