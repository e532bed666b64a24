use super::recycler;
use crate::error::Result;
use std::io::{self, Write};

/// Buffered byte output over a [`Write`] sink.
///
/// Holds one owned, fixed-capacity buffer leased from the per-thread
/// recycler. `ensure_room(n)` guarantees that `n` bytes can be appended
/// without draining mid-item, which keeps multi-byte headers contiguous in
/// the buffer.
pub(crate) struct ByteOutput<W> {
    sink: Option<W>,
    buf: Vec<u8>,
    capacity: usize,
}

impl<W: Write> ByteOutput<W> {
    pub fn new(sink: W, capacity: usize) -> Self {
        Self {
            sink: Some(sink),
            buf: recycler::lease(capacity),
            capacity,
        }
    }

    fn sink(&mut self) -> io::Result<&mut W> {
        self.sink
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "output is closed"))
    }

    fn drain(&mut self) -> Result<()> {
        if !self.buf.is_empty() {
            let buf = std::mem::take(&mut self.buf);
            let result = self.sink()?.write_all(&buf);
            self.buf = buf;
            self.buf.clear();
            result?;
        }
        Ok(())
    }

    /// After this returns, at least `n` bytes are writable without a drain.
    pub fn ensure_room(&mut self, n: usize) -> Result<()> {
        debug_assert!(n <= self.capacity);
        if self.buf.len() + n > self.capacity {
            self.drain()?;
        }
        Ok(())
    }

    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        if self.buf.len() == self.capacity {
            self.drain()?;
        }
        self.buf.push(byte);
        Ok(())
    }

    /// Append a slice, choosing between a straight copy into the buffer and
    /// a drain-then-passthrough for payloads of buffer size or more.
    pub fn write_slice(&mut self, bytes: &[u8]) -> Result<()> {
        if self.buf.len() + bytes.len() <= self.capacity {
            self.buf.extend_from_slice(bytes);
        } else {
            self.drain()?;
            if bytes.len() >= self.capacity {
                self.sink()?.write_all(bytes)?;
            } else {
                self.buf.extend_from_slice(bytes);
            }
        }
        Ok(())
    }

    /// Drain the owned buffer; forward the flush when asked to.
    pub fn flush(&mut self, flush_stream: bool) -> Result<()> {
        self.drain()?;
        if flush_stream {
            self.sink()?.flush()?;
        }
        Ok(())
    }

    /// Return the buffer to the recycler; optionally drop the sink.
    pub fn close(&mut self, drop_sink: bool) {
        recycler::give_back(std::mem::take(&mut self.buf));
        if drop_sink {
            self.sink = None;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sink.is_none()
    }
}

impl<W> Drop for ByteOutput<W> {
    fn drop(&mut self) {
        // buffered bytes that were never flushed are dropped with us
        recycler::give_back(std::mem::take(&mut self.buf));
    }
}
