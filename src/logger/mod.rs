//! The dispatch core: turns logging calls into records and fans each one out to
//! every interested handler under a single lock.
//!
//! A `Logger` is a cheap handle; clones share handlers, processors, the record
//! pool, and the last-error slot.

mod builder;
mod daemon;
mod processor;
mod record_builder;
mod terminal;

pub use builder::{FileBuilder, LoggerBuilder};
pub use daemon::FlushDaemon;
pub use processor::{Processor, add_fields, add_pid, add_unique_id};
pub use record_builder::RecordBuilder;
pub use terminal::{Terminal, TerminalAction, TerminalCallback};

use crate::Error;
use crate::handler::Handler;
use crate::internal;
use crate::level::Level;
use crate::record::{ERROR_KEY, Record, RecordPool};
use crate::rotate::Clock;
use std::fmt::{self, Write as _};
use std::panic::Location;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};
use std::thread;
use std::time::Duration;

/// Channel name used when none is configured.
pub const DEFAULT_NAME: &str = "application";

/// Result of [`Logger::flush_timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Completed,
    /// The flush is still running on its own thread and finishes in the background.
    TimedOut,
}

/// Runs before the process exits, in registration order.
pub type ExitHandler = Arc<dyn Fn() + Send + Sync>;

/// Everything the dispatch lock protects.
struct Dispatch {
    handlers: Vec<Arc<dyn Handler>>,
    last_err: Option<Error>,
}

struct Inner {
    name: String,
    min_level: Level,
    report_caller: bool,
    /// Off for the crate's own diagnostic logger, which has nowhere else to report.
    diagnostics: bool,
    clock: Arc<dyn Clock>,
    terminal: RwLock<TerminalAction>,
    processors: RwLock<Vec<Arc<dyn Processor>>>,
    dispatch: Mutex<Dispatch>,
    pool: Mutex<RecordPool>,
    exit_handlers: Mutex<Vec<ExitHandler>>,
}

#[derive(Clone)]
pub struct Logger {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.inner.name)
            .field("min_level", &self.inner.min_level)
            .field("handlers", &self.handler_count())
            .finish_non_exhaustive()
    }
}

impl Default for Logger {
    fn default() -> Self {
        LoggerBuilder::new().build()
    }
}

impl Logger {
    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[must_use]
    pub fn min_level(&self) -> Level {
        self.inner.min_level
    }

    // ---- records -------------------------------------------------------

    pub(crate) fn acquire(&self) -> Record {
        lock(&self.inner.pool).acquire()
    }

    pub(crate) fn release(&self, record: Record) {
        lock(&self.inner.pool).release(record);
    }

    /// Records idle in the pool.
    #[must_use]
    pub fn pooled_records(&self) -> usize {
        lock(&self.inner.pool).idle()
    }

    /// Starts a record carrying fields, data, a custom time, or a context.
    #[must_use]
    pub fn record(&self) -> RecordBuilder<'_> {
        RecordBuilder::new(self, self.acquire())
    }

    /// Fills in what every record gets, runs processors, dispatches, and returns the
    /// record to the pool. Fatal and panic records then run the terminal action.
    pub(crate) fn emit(
        &self,
        mut record: Record,
        level: Level,
        message: fmt::Arguments<'_>,
        time_set: bool,
        caller: &'static Location<'static>,
    ) {
        record.level = level;
        record.message.clear();
        let _ = record.message.write_fmt(message);
        if !time_set {
            record.time = self.inner.clock.now();
        }

        if level >= self.inner.min_level {
            record.channel.clear();
            record.channel.push_str(&self.inner.name);
            if self.inner.report_caller {
                record.caller = Some(caller.into());
            }
            for processor in read(&self.inner.processors).iter() {
                processor.process(&mut record);
            }
            self.fan_out(&record);
        }

        let terminal = match level {
            Level::Fatal => Some(Terminal::Exit(1)),
            Level::Panic => Some(Terminal::Panic(record.message.clone())),
            _ => None,
        };
        self.release(record);

        if let Some(terminal) = terminal {
            let _ = self.flush();
            match terminal {
                Terminal::Exit(code) => self.exit(code),
                panic => self.run_terminal(panic),
            }
        }
    }

    fn fan_out(&self, record: &Record) {
        let mut guard = lock(&self.inner.dispatch);
        let dispatch = &mut *guard;
        for handler in &dispatch.handlers {
            if !handler.is_handling(record.level) {
                continue;
            }
            if let Err(e) = handler.handle(record) {
                self.report("handle", &e);
                dispatch.last_err = Some(e);
            }
        }
    }

    fn report(&self, what: &str, err: &Error) {
        if self.inner.diagnostics {
            internal::error(
                "LOGGER",
                &format!("{}: {what} failed: {err}", self.inner.name),
            );
        }
    }

    // ---- leveled API ---------------------------------------------------

    #[track_caller]
    pub fn log(&self, level: Level, message: impl fmt::Display) {
        self.logf(level, format_args!("{message}"));
    }

    #[track_caller]
    pub fn logf(&self, level: Level, args: fmt::Arguments<'_>) {
        self.emit(self.acquire(), level, args, false, Location::caller());
    }

    #[track_caller]
    pub fn trace(&self, message: impl fmt::Display) {
        self.log(Level::Trace, message);
    }

    #[track_caller]
    pub fn tracef(&self, args: fmt::Arguments<'_>) {
        self.logf(Level::Trace, args);
    }

    #[track_caller]
    pub fn debug(&self, message: impl fmt::Display) {
        self.log(Level::Debug, message);
    }

    #[track_caller]
    pub fn debugf(&self, args: fmt::Arguments<'_>) {
        self.logf(Level::Debug, args);
    }

    #[track_caller]
    pub fn info(&self, message: impl fmt::Display) {
        self.log(Level::Info, message);
    }

    #[track_caller]
    pub fn infof(&self, args: fmt::Arguments<'_>) {
        self.logf(Level::Info, args);
    }

    #[track_caller]
    pub fn notice(&self, message: impl fmt::Display) {
        self.log(Level::Notice, message);
    }

    #[track_caller]
    pub fn noticef(&self, args: fmt::Arguments<'_>) {
        self.logf(Level::Notice, args);
    }

    /// Same as [`notice`](Self::notice).
    #[track_caller]
    pub fn print(&self, message: impl fmt::Display) {
        self.log(Level::Notice, message);
    }

    #[track_caller]
    pub fn printf(&self, args: fmt::Arguments<'_>) {
        self.logf(Level::Notice, args);
    }

    #[track_caller]
    pub fn warn(&self, message: impl fmt::Display) {
        self.log(Level::Warn, message);
    }

    #[track_caller]
    pub fn warnf(&self, args: fmt::Arguments<'_>) {
        self.logf(Level::Warn, args);
    }

    #[track_caller]
    pub fn error(&self, message: impl fmt::Display) {
        self.log(Level::Error, message);
    }

    #[track_caller]
    pub fn errorf(&self, args: fmt::Arguments<'_>) {
        self.logf(Level::Error, args);
    }

    /// An error record whose message is `err`, with the message also under `fields["error"]`.
    #[track_caller]
    pub fn error_value(&self, err: &dyn std::error::Error) {
        let mut record = self.acquire();
        let message = err.to_string();
        record.add_field(ERROR_KEY, message.as_str());
        self.emit(
            record,
            Level::Error,
            format_args!("{message}"),
            false,
            Location::caller(),
        );
    }

    /// Logs, flushes, runs exit handlers, then the terminal action with exit code 1.
    #[track_caller]
    pub fn fatal(&self, message: impl fmt::Display) {
        self.log(Level::Fatal, message);
    }

    #[track_caller]
    pub fn fatalf(&self, args: fmt::Arguments<'_>) {
        self.logf(Level::Fatal, args);
    }

    /// Logs, flushes, then the terminal action with the message as panic payload.
    #[track_caller]
    pub fn panic(&self, message: impl fmt::Display) {
        self.log(Level::Panic, message);
    }

    #[track_caller]
    pub fn panicf(&self, args: fmt::Arguments<'_>) {
        self.logf(Level::Panic, args);
    }

    // ---- registration --------------------------------------------------

    pub fn add_handler<H: Handler + 'static>(&self, handler: H) {
        lock(&self.inner.dispatch).handlers.push(Arc::new(handler));
    }

    pub fn add_handlers<I: IntoIterator<Item = Arc<dyn Handler>>>(&self, handlers: I) {
        lock(&self.inner.dispatch).handlers.extend(handlers);
    }

    pub fn set_handlers(&self, handlers: Vec<Arc<dyn Handler>>) {
        lock(&self.inner.dispatch).handlers = handlers;
    }

    #[must_use]
    pub fn handler_count(&self) -> usize {
        lock(&self.inner.dispatch).handlers.len()
    }

    pub fn add_processor<P: Processor + 'static>(&self, processor: P) {
        self.processors_mut().push(Arc::new(processor));
    }

    pub fn add_processors<I: IntoIterator<Item = Arc<dyn Processor>>>(&self, processors: I) {
        self.processors_mut().extend(processors);
    }

    pub fn set_processors(&self, processors: Vec<Arc<dyn Processor>>) {
        *self.processors_mut() = processors;
    }

    fn processors_mut(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Arc<dyn Processor>>> {
        self.inner
            .processors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Drops every handler and processor.
    pub fn reset(&self) {
        self.reset_handlers();
        self.reset_processors();
    }

    pub fn reset_handlers(&self) {
        lock(&self.inner.dispatch).handlers.clear();
    }

    pub fn reset_processors(&self) {
        self.processors_mut().clear();
    }

    pub fn set_terminal_action(&self, action: TerminalAction) {
        *self
            .inner
            .terminal
            .write()
            .unwrap_or_else(PoisonError::into_inner) = action;
    }

    /// Fatal and panic records are written but neither exit nor panic.
    pub fn do_nothing_on_panic_fatal(&self) {
        self.set_terminal_action(TerminalAction::Noop);
    }

    pub fn register_exit_handler<F: Fn() + Send + Sync + 'static>(&self, handler: F) {
        lock(&self.inner.exit_handlers).push(Arc::new(handler));
    }

    // ---- lifecycle -----------------------------------------------------

    /// Flushes every handler in registration order. A failing handler does not
    /// stop the others.
    ///
    /// # Errors
    /// The last handler failure of this pass; it is also kept as [`last_err`](Self::last_err).
    pub fn flush(&self) -> Result<(), Error> {
        self.visit("flush", |h| h.flush())
    }

    /// Closes every handler (each flushes first).
    ///
    /// # Errors
    /// The last handler failure of this pass; it is also kept as [`last_err`](Self::last_err).
    pub fn close(&self) -> Result<(), Error> {
        self.visit("close", |h| h.close())
    }

    fn visit<F>(&self, what: &str, mut op: F) -> Result<(), Error>
    where
        F: FnMut(&dyn Handler) -> Result<(), Error>,
    {
        let mut guard = lock(&self.inner.dispatch);
        let dispatch = &mut *guard;
        let mut result = Ok(());
        for handler in &dispatch.handlers {
            if let Err(e) = op(handler.as_ref()) {
                self.report(what, &e);
                dispatch.last_err = Some(e.clone());
                result = Err(e);
            }
        }
        result
    }

    /// Flushes on a separate thread and waits at most `timeout` for it.
    ///
    /// A flush that overruns is not cancelled; it keeps the dispatch lock until
    /// it finishes, and any failure still lands in [`last_err`](Self::last_err).
    ///
    /// # Errors
    /// The flush failed within the timeout, or its thread could not be spawned.
    pub fn flush_timeout(&self, timeout: Duration) -> Result<FlushOutcome, Error> {
        let (tx, rx) = mpsc::channel();
        let logger = self.clone();
        thread::Builder::new()
            .name("driftlog-flush".to_string())
            .spawn(move || {
                let _ = tx.send(logger.flush());
            })?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result.map(|()| FlushOutcome::Completed),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if self.inner.diagnostics {
                    internal::error(
                        "LOGGER",
                        &format!(
                            "{}: flush took longer than {}ms",
                            self.inner.name,
                            timeout.as_millis()
                        ),
                    );
                }
                Ok(FlushOutcome::TimedOut)
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Error::Io(Arc::new(
                std::io::Error::other("flush thread exited without a result"),
            ))),
        }
    }

    /// Flushes every `interval` on a background thread until the returned
    /// daemon is stopped or dropped.
    ///
    /// # Errors
    /// The thread could not be spawned.
    pub fn flush_daemon(&self, interval: Duration) -> Result<FlushDaemon, Error> {
        FlushDaemon::spawn(self.clone(), interval)
    }

    /// Returns and clears the most recent handler failure.
    #[must_use]
    pub fn last_err(&self) -> Option<Error> {
        lock(&self.inner.dispatch).last_err.take()
    }

    /// Runs the registered exit handlers, then the terminal action with `code`.
    pub fn exit(&self, code: i32) {
        let handlers: Vec<ExitHandler> = lock(&self.inner.exit_handlers).clone();
        for handler in handlers {
            handler();
        }
        self.run_terminal(Terminal::Exit(code));
    }

    fn run_terminal(&self, terminal: Terminal) {
        let action = read(&self.inner.terminal).clone();
        action.run(terminal);
    }
}
