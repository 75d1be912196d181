//! Level-filtered consumers of records.
//!
//! A [`Handler`] decides which records it wants and where their bytes go. The
//! stock [`SinkHandler`] formats a record, then writes it to a [`Sink`] under its
//! own lock, which is what keeps one record's bytes contiguous and makes the
//! buffer and rotation state atomic per handler.

mod config;

pub use config::HandlerConfig;

use crate::Error;
use crate::fmt::{Formatter, JsonFormatter, TextFormatter};
use crate::level::{Level, LevelFilter};
use crate::record::Record;
use crate::rotate::RotateTime;
use crate::sink::{Capability, Sink, close_with, flush_with};
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// `Send + Sync` so one handler can be shared by every thread logging through a logger.
pub trait Handler: Send + Sync {
    fn is_handling(&self, level: Level) -> bool;

    /// Writes one record. Only called for levels the handler accepts.
    ///
    /// # Errors
    /// Formatting or sink failures, including deferred ones such as a failed rotation.
    fn handle(&self, record: &Record) -> Result<(), Error>;

    /// # Errors
    /// Sink failures.
    fn flush(&self) -> Result<(), Error>;

    /// Final flush and release of the sink.
    ///
    /// # Errors
    /// Sink failures.
    fn close(&self) -> Result<(), Error>;

    fn formatter(&self) -> Option<Arc<dyn Formatter>> {
        None
    }

    fn set_formatter(&self, formatter: Arc<dyn Formatter>) {
        let _ = formatter;
    }
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn is_handling(&self, level: Level) -> bool {
        (**self).is_handling(level)
    }

    fn handle(&self, record: &Record) -> Result<(), Error> {
        (**self).handle(record)
    }

    fn flush(&self) -> Result<(), Error> {
        (**self).flush()
    }

    fn close(&self) -> Result<(), Error> {
        (**self).close()
    }

    fn formatter(&self) -> Option<Arc<dyn Formatter>> {
        (**self).formatter()
    }

    fn set_formatter(&self, formatter: Arc<dyn Formatter>) {
        (**self).set_formatter(formatter);
    }
}

/// A handler writing formatted records to one sink.
pub struct SinkHandler {
    filter: LevelFilter,
    formatter: RwLock<Arc<dyn Formatter>>,
    sink: Mutex<Box<dyn Sink>>,
    capability: Capability,
}

impl std::fmt::Debug for SinkHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkHandler")
            .field("filter", &self.filter)
            .field("capability", &self.capability)
            .finish_non_exhaustive()
    }
}

impl SinkHandler {
    /// A handler using the default [`TextFormatter`].
    pub fn new<S: Sink + 'static>(sink: S, filter: impl Into<LevelFilter>) -> Self {
        Self::from_boxed(Box::new(sink), filter)
    }

    pub fn from_boxed(sink: Box<dyn Sink>, filter: impl Into<LevelFilter>) -> Self {
        let capability = sink.capability();
        Self {
            filter: filter.into(),
            formatter: RwLock::new(Arc::new(TextFormatter::new())),
            sink: Mutex::new(sink),
            capability,
        }
    }

    #[must_use]
    pub fn with_formatter(self, formatter: impl Formatter + 'static) -> Self {
        *self.formatter.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(formatter);
        self
    }

    #[must_use]
    pub const fn filter(&self) -> LevelFilter {
        self.filter
    }

    /// Capability of the sink, read when the handler was built.
    #[must_use]
    pub const fn capability(&self) -> Capability {
        self.capability
    }

    fn sink(&self) -> MutexGuard<'_, Box<dyn Sink>> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_formatter(&self) -> Arc<dyn Formatter> {
        Arc::clone(&self.formatter.read().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Handler for SinkHandler {
    fn is_handling(&self, level: Level) -> bool {
        self.filter.accepts(level)
    }

    fn handle(&self, record: &Record) -> Result<(), Error> {
        let mut buf = Vec::with_capacity(256);
        self.current_formatter().format(record, &mut buf)?;

        let mut sink = self.sink();
        let written = sink.write_all(&buf);
        let deferred = sink.take_error();
        written?;
        deferred.map_or(Ok(()), Err)
    }

    /// Draining a buffer can rotate, so deferred sink errors are collected here too.
    fn flush(&self) -> Result<(), Error> {
        let mut sink = self.sink();
        let flushed = flush_with(&mut **sink, self.capability);
        let deferred = sink.take_error();
        flushed?;
        deferred.map_or(Ok(()), Err)
    }

    fn close(&self) -> Result<(), Error> {
        let mut sink = self.sink();
        let closed = close_with(&mut **sink, self.capability);
        let deferred = sink.take_error();
        closed?;
        deferred.map_or(Ok(()), Err)
    }

    fn formatter(&self) -> Option<Arc<dyn Formatter>> {
        Some(self.current_formatter())
    }

    fn set_formatter(&self, formatter: Arc<dyn Formatter>) {
        *self.formatter.write().unwrap_or_else(PoisonError::into_inner) = formatter;
    }
}

/// Text records to stdout.
pub fn console_handler(filter: impl Into<LevelFilter>) -> SinkHandler {
    SinkHandler::new(io::stdout(), filter)
}

/// Appends every level to `path`, line-buffered, without rotation.
///
/// # Errors
/// The file cannot be opened.
pub fn file_handler(path: impl AsRef<Path>, use_json: bool) -> Result<SinkHandler, Error> {
    HandlerConfig::new(path.as_ref())
        .max_size(0)
        .rotate_time(None)
        .use_json(use_json)
        .create_handler()
}

/// Every level to a rotating `path`.
///
/// # Errors
/// Both triggers disabled, or the file cannot be opened.
pub fn rotating_handler(
    path: impl AsRef<Path>,
    max_size: u64,
    rotate_time: Option<RotateTime>,
) -> Result<SinkHandler, Error> {
    HandlerConfig::new(path.as_ref())
        .max_size(max_size)
        .rotate_time(rotate_time)
        .rotating_handler()
}

fn formatter_for(use_json: bool) -> Arc<dyn Formatter> {
    if use_json {
        Arc::new(JsonFormatter::new())
    } else {
        Arc::new(TextFormatter::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    #[test]
    fn filters_by_level() {
        let handler = SinkHandler::new(MemorySink::new(), Level::Warn);
        assert!(!handler.is_handling(Level::Info));
        assert!(handler.is_handling(Level::Error));
    }

    #[test]
    fn formatter_can_be_swapped() {
        let sink = MemorySink::new();
        let handler = SinkHandler::new(sink.clone(), LevelFilter::all());
        handler.set_formatter(Arc::new(|r: &Record, buf: &mut Vec<u8>| {
            buf.extend_from_slice(r.message.as_bytes());
            buf.push(b'\n');
            Ok::<(), Error>(())
        }));
        handler.handle(&Record::new(Level::Info, "plain")).unwrap();
        assert_eq!(sink.contents_string(), "plain\n");
    }
}
