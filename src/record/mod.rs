//! One log event as it travels from the logging call through every handler.

mod pool;

pub use pool::{DEFAULT_POOL_CAPACITY, RecordPool};

use crate::level::Level;
use chrono::{DateTime, Local};
use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Key/value payload attached to a record.
pub type Fields = Map<String, Value>;

/// Key under which `RecordBuilder::error` stores an error's message.
pub const ERROR_KEY: &str = "error";

/// Source location of the logging call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl From<&'static Location<'static>> for Caller {
    fn from(loc: &'static Location<'static>) -> Self {
        Self {
            file: loc.file(),
            line: loc.line(),
            column: loc.column(),
        }
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Opaque per-call context (request ids, cancellation handles) that processors may inspect.
pub type Context = Arc<dyn Any + Send + Sync>;

/// A single log event.
///
/// Records come from the logger's [`RecordPool`] and go back to it as soon as the
/// fan-out finishes. Handlers only ever see `&Record`, so nothing can hold on to one
/// past the logging call that produced it.
pub struct Record {
    pub level: Level,
    /// Name of the logger that emitted the record.
    pub channel: String,
    pub message: String,
    pub time: DateTime<Local>,
    /// User-supplied fields.
    pub fields: Fields,
    /// Structured log data.
    pub data: Fields,
    /// Metadata added by processors.
    pub extra: Fields,
    pub caller: Option<Caller>,
    pub context: Option<Context>,
}

impl Record {
    #[must_use]
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            ..Self::default()
        }
    }

    /// Adds or overwrites one field.
    pub fn add_field(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Adds or overwrites one entry of extra metadata.
    pub fn add_extra(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    /// Adds or overwrites one data entry.
    pub fn add_data(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.data.insert(name.into(), value.into());
        self
    }

    /// Typed view of the context handle.
    #[must_use]
    pub fn context_ref<T: Any>(&self) -> Option<&T> {
        self.context.as_deref().and_then(|c| c.downcast_ref::<T>())
    }

    /// Clears everything a previous call may have set, keeping map allocations.
    pub(crate) fn reset(&mut self) {
        self.level = Level::default();
        self.channel.clear();
        self.message.clear();
        self.time = DateTime::<Local>::default();
        self.fields.clear();
        self.data.clear();
        self.extra.clear();
        self.caller = None;
        self.context = None;
    }
}

impl Default for Record {
    fn default() -> Self {
        Self {
            level: Level::default(),
            channel: String::new(),
            message: String::new(),
            time: DateTime::<Local>::default(),
            fields: Fields::new(),
            data: Fields::new(),
            extra: Fields::new(),
            caller: None,
            context: None,
        }
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("level", &self.level)
            .field("channel", &self.channel)
            .field("message", &self.message)
            .field("time", &self.time)
            .field("fields", &self.fields)
            .field("data", &self.data)
            .field("extra", &self.extra)
            .field("caller", &self.caller)
            .field("context", &self.context.is_some())
            .finish()
    }
}
