use super::Logger;
use crate::level::Level;
use crate::record::{Context, ERROR_KEY, Fields, Record};
use chrono::{DateTime, Local};
use serde_json::Value;
use std::fmt;
use std::panic::Location;

/// A record being filled in before it is logged.
///
/// ```no_run
/// # let logger = driftlog::Logger::default();
/// logger
///     .record()
///     .field("user", "ada")
///     .field("attempt", 3)
///     .warn("login throttled");
/// ```
///
/// Dropping an unfinished builder returns its record to the pool.
#[must_use = "a record builder does nothing until a level method is called"]
pub struct RecordBuilder<'a> {
    logger: &'a Logger,
    record: Option<Record>,
    time_set: bool,
}

impl<'a> RecordBuilder<'a> {
    pub(super) const fn new(logger: &'a Logger, record: Record) -> Self {
        Self {
            logger,
            record: Some(record),
            time_set: false,
        }
    }

    fn edit(mut self, f: impl FnOnce(&mut Record)) -> Self {
        if let Some(record) = self.record.as_mut() {
            f(record);
        }
        self
    }

    pub fn field(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.edit(|r| {
            r.add_field(name, value);
        })
    }

    pub fn fields(self, fields: Fields) -> Self {
        self.edit(|r| r.fields.extend(fields))
    }

    pub fn data(self, data: Fields) -> Self {
        self.edit(|r| r.data.extend(data))
    }

    pub fn extra(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.edit(|r| {
            r.add_extra(name, value);
        })
    }

    /// Overrides the timestamp taken from the logger's clock.
    pub fn time(mut self, time: DateTime<Local>) -> Self {
        self.time_set = true;
        self.edit(|r| r.time = time)
    }

    pub fn context(self, context: Context) -> Self {
        self.edit(|r| r.context = Some(context))
    }

    /// Stores the error's message under `fields["error"]`.
    pub fn error(self, err: &dyn std::error::Error) -> Self {
        let message = err.to_string();
        self.edit(|r| {
            r.add_field(ERROR_KEY, message);
        })
    }

    #[track_caller]
    pub fn log(mut self, level: Level, message: impl fmt::Display) {
        if let Some(record) = self.record.take() {
            self.logger.emit(
                record,
                level,
                format_args!("{message}"),
                self.time_set,
                Location::caller(),
            );
        }
    }

    #[track_caller]
    pub fn trace(self, message: impl fmt::Display) {
        self.log(Level::Trace, message);
    }

    #[track_caller]
    pub fn debug(self, message: impl fmt::Display) {
        self.log(Level::Debug, message);
    }

    #[track_caller]
    pub fn info(self, message: impl fmt::Display) {
        self.log(Level::Info, message);
    }

    #[track_caller]
    pub fn notice(self, message: impl fmt::Display) {
        self.log(Level::Notice, message);
    }

    #[track_caller]
    pub fn warn(self, message: impl fmt::Display) {
        self.log(Level::Warn, message);
    }

    /// Logs at error level. Named `error_msg` since [`error`](Self::error) attaches an error value.
    #[track_caller]
    pub fn error_msg(self, message: impl fmt::Display) {
        self.log(Level::Error, message);
    }

    #[track_caller]
    pub fn fatal(self, message: impl fmt::Display) {
        self.log(Level::Fatal, message);
    }

    #[track_caller]
    pub fn panic(self, message: impl fmt::Display) {
        self.log(Level::Panic, message);
    }
}

impl Drop for RecordBuilder<'_> {
    fn drop(&mut self) {
        if let Some(record) = self.record.take() {
            self.logger.release(record);
        }
    }
}
