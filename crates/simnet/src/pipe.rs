//! Unbuffered in-memory pipe.
//!
//! One writer, one reader, no buffer: `write` parks its bytes in a single
//! slot and returns only once the reader has consumed all of them (across
//! as many `read` calls as it takes). Either end can be closed with a
//! reason; `Eof` means orderly shutdown, `Reset` means failure.
//!
//! Callers must serialize same-end operations (one `read` and one `write`
//! in flight at a time). `Stream` does that.

use std::sync::Arc;

use bytes::{Buf, Bytes};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Closed {
    Eof,
    Reset,
}

impl Closed {
    /// Reset wins over Eof; an end never goes back from Reset to Eof.
    fn merge(current: Option<Closed>, next: Closed) -> Closed {
        match (current, next) {
            (Some(Closed::Reset), _) | (_, Closed::Reset) => Closed::Reset,
            _ => Closed::Eof,
        }
    }
}

#[derive(Default)]
struct PipeState {
    /// Bytes offered by the writer and not yet read.
    pending: Bytes,
    write_closed: Option<Closed>,
    read_closed: Option<Closed>,
}

impl PipeState {
    fn write_error(&self) -> Option<Error> {
        match (self.write_closed, self.read_closed) {
            (Some(Closed::Reset), _) | (_, Some(Closed::Reset)) => Some(Error::StreamReset),
            (Some(Closed::Eof), _) | (_, Some(Closed::Eof)) => Some(Error::StreamClosed),
            (None, None) => None,
        }
    }
}

#[derive(Default)]
struct Pipe {
    state: Mutex<PipeState>,
    /// Reader waits here for data or a write-side close.
    readable: Notify,
    /// Writer waits here for its bytes to be consumed or a read-side close.
    drained: Notify,
}

impl Pipe {
    fn wake_both(&self) {
        self.readable.notify_one();
        self.drained.notify_one();
    }
}

/// Create a connected reader/writer pair.
pub(crate) fn pipe() -> (PipeReader, PipeWriter) {
    let pipe = Arc::new(Pipe::default());
    (PipeReader { pipe: pipe.clone() }, PipeWriter { pipe })
}

pub(crate) struct PipeReader {
    pipe: Arc<Pipe>,
}

impl PipeReader {
    /// Read up to `buf.len()` bytes. `Ok(0)` is end-of-stream.
    pub(crate) async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        loop {
            {
                let mut st = self.pipe.state.lock();
                match st.read_closed {
                    Some(Closed::Reset) => return Err(Error::StreamReset),
                    Some(Closed::Eof) => return Err(Error::StreamClosed),
                    None => {}
                }
                if buf.is_empty() {
                    return Ok(0);
                }
                if !st.pending.is_empty() {
                    let n = buf.len().min(st.pending.len());
                    buf[..n].copy_from_slice(&st.pending[..n]);
                    st.pending.advance(n);
                    let drained = st.pending.is_empty();
                    drop(st);
                    if drained {
                        self.pipe.drained.notify_one();
                    }
                    return Ok(n);
                }
                match st.write_closed {
                    Some(Closed::Eof) => return Ok(0),
                    Some(Closed::Reset) => return Err(Error::StreamReset),
                    None => {}
                }
            }
            self.pipe.readable.notified().await;
        }
    }

    /// Close the read end. A writer blocked on this pipe fails.
    pub(crate) fn close(&self, reason: Closed) {
        let mut st = self.pipe.state.lock();
        st.read_closed = Some(Closed::merge(st.read_closed, reason));
        drop(st);
        self.pipe.wake_both();
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        self.close(Closed::Eof);
    }
}

pub(crate) struct PipeWriter {
    pipe: Arc<Pipe>,
}

impl PipeWriter {
    /// Hand `data` to the reader; returns once every byte has been read.
    pub(crate) async fn write(&self, data: &[u8]) -> Result<usize> {
        {
            let mut st = self.pipe.state.lock();
            if let Some(err) = st.write_error() {
                return Err(err);
            }
            if data.is_empty() {
                return Ok(0);
            }
            st.pending = Bytes::copy_from_slice(data);
        }
        self.pipe.readable.notify_one();

        loop {
            {
                let mut st = self.pipe.state.lock();
                if st.write_closed == Some(Closed::Reset) {
                    return Err(Error::StreamReset);
                }
                if st.pending.is_empty() {
                    return Ok(data.len());
                }
                if let Some(reason) = st.read_closed {
                    // The reader is gone; what it did not take is lost.
                    st.pending.clear();
                    return Err(match reason {
                        Closed::Reset => Error::StreamReset,
                        Closed::Eof => Error::StreamClosed,
                    });
                }
            }
            self.pipe.drained.notified().await;
        }
    }

    /// Close the write end.
    ///
    /// `Eof` lets the reader drain what is pending and then see end-of-stream.
    /// `Reset` discards pending bytes and fails the reader.
    pub(crate) fn close(&self, reason: Closed) {
        let mut st = self.pipe.state.lock();
        let merged = Closed::merge(st.write_closed, reason);
        st.write_closed = Some(merged);
        if merged == Closed::Reset {
            st.pending.clear();
        }
        drop(st);
        self.pipe.wake_both();
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        self.close(Closed::Eof);
    }
}
