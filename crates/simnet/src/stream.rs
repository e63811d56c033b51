//! Bidirectional streams built from two pipes.

use std::fmt;
use std::time::Instant;

use tokio::sync::Mutex;

use crate::error::Result;
use crate::pipe::{pipe, Closed, PipeReader, PipeWriter};

/// Identifies a stream within its connection. Both halves share the id.
pub type StreamId = u64;

/// One side of a bidirectional byte stream.
///
/// `read` and `write` may run concurrently from different tasks; calls in
/// the same direction are served one at a time. Dropping a stream closes
/// both of its pipe ends: the peer reads end-of-stream and its writes fail.
pub struct Stream {
    id: StreamId,
    reader: PipeReader,
    writer: PipeWriter,
    read_turn: Mutex<()>,
    write_turn: Mutex<()>,
}

impl Stream {
    fn new(id: StreamId, reader: PipeReader, writer: PipeWriter) -> Self {
        Self {
            id,
            reader,
            writer,
            read_turn: Mutex::new(()),
            write_turn: Mutex::new(()),
        }
    }

    /// Two connected halves: what one writes, the other reads.
    pub(crate) fn pair(id: StreamId) -> (Stream, Stream) {
        let (local_in, remote_out) = pipe();
        let (remote_in, local_out) = pipe();
        (
            Stream::new(id, local_in, local_out),
            Stream::new(id, remote_in, remote_out),
        )
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Read up to `buf.len()` bytes.
    ///
    /// Waits until the peer writes, half-closes (`Ok(0)`), or either side
    /// resets (`Error::StreamReset`).
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let _turn = self.read_turn.lock().await;
        self.reader.read(buf).await
    }

    /// Write all of `buf`, returning once the peer has read every byte.
    pub async fn write(&self, buf: &[u8]) -> Result<usize> {
        let _turn = self.write_turn.lock().await;
        self.writer.write(buf).await
    }

    /// Read until end-of-stream.
    pub async fn read_to_end(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = self.read(&mut buf).await?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    /// Half-close: the peer sees end-of-stream, our read side stays open.
    pub fn close(&self) -> Result<()> {
        self.writer.close(Closed::Eof);
        Ok(())
    }

    /// Abort both directions. Every pending or later read/write on either
    /// side fails with `StreamReset`.
    pub fn reset(&self) -> Result<()> {
        self.writer.close(Closed::Reset);
        self.reader.close(Closed::Reset);
        Ok(())
    }

    // There is no clock in the simulation; deadlines are accepted and ignored.

    pub fn set_deadline(&self, _deadline: Instant) -> Result<()> {
        Ok(())
    }

    pub fn set_read_deadline(&self, _deadline: Instant) -> Result<()> {
        Ok(())
    }

    pub fn set_write_deadline(&self, _deadline: Instant) -> Result<()> {
        Ok(())
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream").field("id", &self.id).finish()
    }
}
