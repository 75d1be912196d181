//! In-memory buffering in front of any sink, so most records cost a `memcpy`
//! instead of a syscall.
//!
//! The writer works on `&mut self`; whoever owns it provides the lock (a
//! [`SinkHandler`](crate::handler::SinkHandler) or [`Shared`](crate::sink::Shared)),
//! so a flush can never interleave with a half-appended record.

use crate::Error;
use crate::internal;
use crate::sink::{Capability, Sink, close_with, flush_with};

/// Record terminator looked for in line mode.
const TERMINATOR: u8 = b'\n';

/// Default capacity used by handler configs.
pub const DEFAULT_BUFFER_SIZE: usize = 256 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferMode {
    /// Forward everything up to the last record terminator after each write, and
    /// everything once occupancy reaches capacity.
    #[default]
    Line,
    /// Forward only once occupancy reaches capacity.
    Bytes,
}

impl std::str::FromStr for BufferMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "line" => Ok(Self::Line),
            "bytes" | "byte" | "bite" => Ok(Self::Bytes),
            _ => Err(Error::config(format!("unknown buffer mode: '{s}'"))),
        }
    }
}

#[derive(Debug)]
pub struct BufferedWriter<S: Sink> {
    inner: S,
    inner_cap: Capability,
    mode: BufferMode,
    capacity: usize,
    buf: Vec<u8>,
    /// End offset of every record appended to `buf`.
    ends: Vec<usize>,
    closed: bool,
}

impl<S: Sink> BufferedWriter<S> {
    /// # Errors
    /// A zero capacity is a configuration error.
    pub fn new(inner: S, mode: BufferMode, capacity: usize) -> Result<Self, Error> {
        if capacity == 0 {
            return Err(Error::config("buffer capacity cannot be zero"));
        }
        let inner_cap = inner.capability();
        Ok(Self {
            inner,
            inner_cap,
            mode,
            capacity,
            buf: Vec::with_capacity(capacity),
            ends: Vec::new(),
            closed: false,
        })
    }

    /// # Errors
    /// A zero capacity is a configuration error.
    pub fn line(inner: S, capacity: usize) -> Result<Self, Error> {
        Self::new(inner, BufferMode::Line, capacity)
    }

    /// # Errors
    /// A zero capacity is a configuration error.
    pub fn bytes(inner: S, capacity: usize) -> Result<Self, Error> {
        Self::new(inner, BufferMode::Bytes, capacity)
    }

    /// Bytes waiting for the next flush.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub const fn mode(&self) -> BufferMode {
        self.mode
    }

    #[must_use]
    pub const fn get_ref(&self) -> &S {
        &self.inner
    }

    fn append(&mut self, data: &[u8], ends: &[usize]) -> Result<(), Error> {
        if self.closed {
            return Err(Error::Closed);
        }
        if data.is_empty() {
            return Ok(());
        }

        let start = self.buf.len();
        self.buf.extend_from_slice(data);
        match self.mode {
            // A write may carry part of a line; only terminators close a record.
            BufferMode::Line => self.ends.extend(
                data.iter()
                    .enumerate()
                    .filter(|&(_, &b)| b == TERMINATOR)
                    .map(|(i, _)| start + i + 1),
            ),
            BufferMode::Bytes => {
                self.ends.extend(
                    ends.iter()
                        .filter(|&&e| e > 0 && e < data.len())
                        .map(|e| start + e),
                );
                self.ends.push(self.buf.len());
            }
        }

        if self.buf.len() >= self.capacity {
            return self.drain_to(self.buf.len());
        }
        if self.mode == BufferMode::Line
            && let Some(pos) = data.iter().rposition(|&b| b == TERMINATOR)
        {
            return self.drain_to(start + pos + 1);
        }
        Ok(())
    }

    /// Hands `buf[..upto]` to the sink. The chunk leaves the buffer whether or not the
    /// sink accepted it, so a failed chunk is reported once and never written twice.
    fn drain_to(&mut self, upto: usize) -> Result<(), Error> {
        if upto == 0 {
            return Ok(());
        }

        let split = self.ends.partition_point(|&e| e <= upto);
        let mut chunk_ends: Vec<usize> = self.ends[..split].to_vec();
        if chunk_ends.last() != Some(&upto) {
            chunk_ends.push(upto);
        }

        let result = self.inner.write_segments(&self.buf[..upto], &chunk_ends);

        self.buf.drain(..upto);
        self.ends.drain(..split);
        for end in &mut self.ends {
            *end -= upto;
        }
        result
    }

    fn drain_all(&mut self) -> Result<(), Error> {
        self.drain_to(self.buf.len())
    }
}

impl<S: Sink> Sink for BufferedWriter<S> {
    fn write_all(&mut self, buf: &[u8]) -> Result<(), Error> {
        self.append(buf, &[])
    }

    fn write_segments(&mut self, buf: &[u8], ends: &[usize]) -> Result<(), Error> {
        self.append(buf, ends)
    }

    /// At least `Flush`, since the buffer itself can always be flushed.
    fn capability(&self) -> Capability {
        self.inner_cap.max(Capability::Flush)
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.drain_all()?;
        if self.inner_cap.supports(Capability::Flush) {
            self.inner.flush()?;
        }
        Ok(())
    }

    fn sync(&mut self) -> Result<(), Error> {
        if self.inner_cap.supports(Capability::Sync) {
            self.inner.sync()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        if self.closed {
            return Ok(());
        }
        self.drain_all()?;
        self.closed = true;
        close_with(&mut self.inner, self.inner_cap)
    }

    fn take_error(&mut self) -> Option<Error> {
        self.inner.take_error()
    }
}

impl<S: Sink> Drop for BufferedWriter<S> {
    fn drop(&mut self) {
        if self.closed || self.buf.is_empty() {
            return;
        }
        if let Err(e) = self
            .drain_all()
            .and_then(|()| flush_with(&mut self.inner, self.inner_cap))
        {
            internal::error("BUFFER", &format!("flush on drop failed: {e}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    #[test]
    fn zero_capacity_is_rejected() {
        let err = BufferedWriter::line(MemorySink::new(), 0).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn line_mode_holds_partial_lines() {
        let sink = MemorySink::new();
        let mut w = BufferedWriter::line(sink.clone(), 1024).unwrap();

        w.write_all(b"par").unwrap();
        assert!(sink.is_empty());
        assert_eq!(w.buffered(), 3);

        w.write_all(b"tial\nnext").unwrap();
        assert_eq!(sink.contents_string(), "partial\n");
        assert_eq!(w.buffered(), 4);
    }

    #[test]
    fn bytes_mode_waits_for_capacity() {
        let sink = MemorySink::new();
        let mut w = BufferedWriter::bytes(sink.clone(), 16).unwrap();

        w.write_all(b"0123456\n").unwrap();
        assert!(sink.is_empty());
        w.write_all(b"abcdefg\n").unwrap();
        assert_eq!(sink.len(), 16);
        assert_eq!(sink.write_count(), 1);
        assert_eq!(w.buffered(), 0);
    }

    #[test]
    fn second_flush_writes_nothing() {
        let sink = MemorySink::new();
        let mut w = BufferedWriter::bytes(sink.clone(), 64).unwrap();
        w.write_all(b"one\n").unwrap();

        w.flush().unwrap();
        let after_first = sink.contents();
        w.flush().unwrap();
        assert_eq!(sink.contents(), after_first);
        assert_eq!(sink.write_count(), 1);
    }

    #[test]
    fn close_flushes_then_closes_inner() {
        let sink = MemorySink::with_capability(Capability::Sync);
        let mut w = BufferedWriter::bytes(sink.clone(), 64).unwrap();
        w.write_all(b"tail\n").unwrap();

        w.close().unwrap();
        assert_eq!(sink.contents_string(), "tail\n");
        assert_eq!(sink.close_count(), 1);
        assert!(sink.sync_count() >= 1);
        assert!(matches!(w.write_all(b"late\n"), Err(Error::Closed)));
    }

    #[test]
    fn drop_flushes_pending_bytes() {
        let sink = MemorySink::new();
        {
            let mut w = BufferedWriter::bytes(sink.clone(), 64).unwrap();
            w.write_all(b"pending\n").unwrap();
        }
        assert_eq!(sink.contents_string(), "pending\n");
    }
}
