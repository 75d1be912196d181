//! What the buffering and rotation layers need from the thing bytes end up in.
//!
//! Every sink can write. Some can also close, flush, or sync to disk; a sink
//! declares the most it supports through [`Capability`], and wrappers read that
//! once when they are built instead of probing on every call.

mod memory;

pub use memory::MemorySink;

use crate::Error;
use std::fs::File;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Ordered: a sink with a higher capability supports everything below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    /// Plain writes only.
    Write,
    /// Writes plus a final close.
    Close,
    /// Writes, close, and flushing of internal buffers.
    Flush,
    /// Everything above plus durable sync to disk.
    Sync,
}

impl Capability {
    #[must_use]
    pub fn supports(self, other: Self) -> bool {
        self >= other
    }
}

/// Destination for formatted records.
pub trait Sink: Send {
    /// Writes the whole buffer or fails.
    ///
    /// # Errors
    /// I/O errors from the destination.
    fn write_all(&mut self, buf: &[u8]) -> Result<(), Error>;

    /// Writes `buf`, where `ends` holds the end offset of every record inside it.
    ///
    /// The rotation engine overrides this so it can switch files between records.
    ///
    /// # Errors
    /// I/O errors from the destination.
    fn write_segments(&mut self, buf: &[u8], ends: &[usize]) -> Result<(), Error> {
        let _ = ends;
        self.write_all(buf)
    }

    /// Read once by wrappers at construction.
    fn capability(&self) -> Capability;

    /// # Errors
    /// I/O errors from the destination.
    fn flush(&mut self) -> Result<(), Error> {
        Ok(())
    }

    /// # Errors
    /// I/O errors from the destination.
    fn sync(&mut self) -> Result<(), Error> {
        Ok(())
    }

    /// # Errors
    /// I/O errors from the destination.
    fn close(&mut self) -> Result<(), Error> {
        Ok(())
    }

    /// Deferred failure that did not stop the last write, e.g. a rotation whose
    /// rename failed while the record still landed in the old file. Returned once.
    fn take_error(&mut self) -> Option<Error> {
        None
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn write_all(&mut self, buf: &[u8]) -> Result<(), Error> {
        (**self).write_all(buf)
    }

    fn write_segments(&mut self, buf: &[u8], ends: &[usize]) -> Result<(), Error> {
        (**self).write_segments(buf, ends)
    }

    fn capability(&self) -> Capability {
        (**self).capability()
    }

    fn flush(&mut self) -> Result<(), Error> {
        (**self).flush()
    }

    fn sync(&mut self) -> Result<(), Error> {
        (**self).sync()
    }

    fn close(&mut self) -> Result<(), Error> {
        (**self).close()
    }

    fn take_error(&mut self) -> Option<Error> {
        (**self).take_error()
    }
}

/// Flushes according to a capability read at construction: sync-capable sinks
/// flush then sync, flush-capable ones flush, the rest have nothing to do.
pub(crate) fn flush_with<S: Sink + ?Sized>(sink: &mut S, cap: Capability) -> Result<(), Error> {
    match cap {
        Capability::Sync => {
            sink.flush()?;
            sink.sync()
        }
        Capability::Flush => sink.flush(),
        Capability::Close | Capability::Write => Ok(()),
    }
}

/// Final flush followed by close, for sinks that support closing.
pub(crate) fn close_with<S: Sink + ?Sized>(sink: &mut S, cap: Capability) -> Result<(), Error> {
    flush_with(sink, cap)?;
    if cap.supports(Capability::Close) {
        sink.close()?;
    }
    Ok(())
}

impl Sink for File {
    fn write_all(&mut self, buf: &[u8]) -> Result<(), Error> {
        Write::write_all(self, buf)?;
        Ok(())
    }

    fn capability(&self) -> Capability {
        Capability::Sync
    }

    fn flush(&mut self) -> Result<(), Error> {
        Write::flush(self)?;
        Ok(())
    }

    fn sync(&mut self) -> Result<(), Error> {
        self.sync_data()?;
        Ok(())
    }
}

impl Sink for io::Stdout {
    fn write_all(&mut self, buf: &[u8]) -> Result<(), Error> {
        self.lock().write_all(buf)?;
        Ok(())
    }

    fn capability(&self) -> Capability {
        Capability::Flush
    }

    fn flush(&mut self) -> Result<(), Error> {
        Write::flush(self)?;
        Ok(())
    }
}

impl Sink for io::Stderr {
    fn write_all(&mut self, buf: &[u8]) -> Result<(), Error> {
        self.lock().write_all(buf)?;
        Ok(())
    }

    fn capability(&self) -> Capability {
        Capability::Flush
    }

    fn flush(&mut self) -> Result<(), Error> {
        Write::flush(self)?;
        Ok(())
    }
}

impl Sink for Vec<u8> {
    fn write_all(&mut self, buf: &[u8]) -> Result<(), Error> {
        self.extend_from_slice(buf);
        Ok(())
    }

    fn capability(&self) -> Capability {
        Capability::Write
    }
}

/// Adapts any `io::Write` with an explicitly declared capability.
///
/// `Write` and `Close` never call the writer's `flush`; `Flush` and `Sync` do
/// (there is no generic sync, so `Sync` behaves like `Flush`).
#[derive(Debug)]
pub struct IoSink<W> {
    inner: W,
    capability: Capability,
}

impl<W: Write + Send> IoSink<W> {
    pub const fn new(inner: W, capability: Capability) -> Self {
        Self { inner, capability }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write + Send> Sink for IoSink<W> {
    fn write_all(&mut self, buf: &[u8]) -> Result<(), Error> {
        self.inner.write_all(buf)?;
        Ok(())
    }

    fn capability(&self) -> Capability {
        self.capability
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.inner.flush()?;
        Ok(())
    }
}

/// A sink behind its own lock, cloneable across threads.
///
/// Use it when nothing upstream already serializes access; a
/// [`SinkHandler`](crate::handler::SinkHandler) locks its sink itself, so the
/// unwrapped form is enough there.
#[derive(Debug)]
pub struct Shared<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for Shared<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Sink> Shared<S> {
    pub fn new(sink: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sink)),
        }
    }

    /// Direct access to the wrapped sink while holding its lock.
    pub fn lock(&self) -> MutexGuard<'_, S> {
        // A panic mid-write leaves plain bytes behind, never a broken invariant.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: Sink> Sink for Shared<S> {
    fn write_all(&mut self, buf: &[u8]) -> Result<(), Error> {
        self.lock().write_all(buf)
    }

    fn write_segments(&mut self, buf: &[u8], ends: &[usize]) -> Result<(), Error> {
        self.lock().write_segments(buf, ends)
    }

    fn capability(&self) -> Capability {
        self.lock().capability()
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.lock().flush()
    }

    fn sync(&mut self) -> Result<(), Error> {
        self.lock().sync()
    }

    fn close(&mut self) -> Result<(), Error> {
        self.lock().close()
    }

    fn take_error(&mut self) -> Option<Error> {
        self.lock().take_error()
    }
}
