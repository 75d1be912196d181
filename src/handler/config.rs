use super::{Handler, SinkHandler, formatter_for};
use crate::Error;
use crate::buffer::{BufferMode, BufferedWriter, DEFAULT_BUFFER_SIZE};
use crate::level::LevelFilter;
use crate::rotate::{
    BackupNamer, Clock, DEFAULT_BACKUP_HOURS, DEFAULT_BACKUP_NUM, RotateConfig, RotateTime,
};
use crate::sink::Sink;
use crate::size::{deserialize_size, deserialize_usize};
use chrono::Duration;
use serde::Deserialize;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;

/// Rotation bound used by handler configs unless set.
pub const DEFAULT_MAX_SIZE: u64 = 20 * 1024 * 1024;

/// Everything needed to assemble a file handler: target, filter, format,
/// buffering, and rotation.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    pub logfile: PathBuf,
    /// A minimum level (`"warn"`) or an exact set (`["error", "fatal"]`).
    pub levels: LevelFilter,
    pub use_json: bool,
    /// `line` or `bytes`.
    #[serde(deserialize_with = "deserialize_buffer_mode")]
    pub buff_mode: BufferMode,
    /// Buffer capacity; 0 writes straight through.
    #[serde(deserialize_with = "deserialize_usize")]
    pub buff_size: usize,
    /// `"hour"`, `"day"`, ...; `"none"` disables the time trigger.
    #[serde(deserialize_with = "deserialize_rotate_time")]
    pub rotate_time: Option<RotateTime>,
    /// Rotation bound in bytes (or `"10M"`); 0 disables the size trigger.
    #[serde(deserialize_with = "deserialize_size")]
    pub max_size: u64,
    pub compress: bool,
    pub backup_num: usize,
    /// Maximum backup age in hours; 0 keeps all.
    pub backup_time: u64,
    #[serde(skip)]
    pub namer: Option<BackupNamer>,
    #[serde(skip)]
    pub clock: Option<Arc<dyn Clock>>,
}

fn deserialize_buffer_mode<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> Result<BufferMode, D::Error> {
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

fn deserialize_rotate_time<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<RotateTime>, D::Error> {
    let s = String::deserialize(deserializer)?;
    match s.trim().to_lowercase().as_str() {
        "" | "none" | "off" | "never" => Ok(None),
        other => other.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            logfile: PathBuf::new(),
            levels: LevelFilter::all(),
            use_json: false,
            buff_mode: BufferMode::Line,
            buff_size: DEFAULT_BUFFER_SIZE,
            rotate_time: Some(RotateTime::Hour),
            max_size: DEFAULT_MAX_SIZE,
            compress: false,
            backup_num: DEFAULT_BACKUP_NUM,
            backup_time: DEFAULT_BACKUP_HOURS,
            namer: None,
            clock: None,
        }
    }
}

impl fmt::Debug for HandlerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerConfig")
            .field("logfile", &self.logfile)
            .field("levels", &self.levels)
            .field("use_json", &self.use_json)
            .field("buff_mode", &self.buff_mode)
            .field("buff_size", &self.buff_size)
            .field("rotate_time", &self.rotate_time)
            .field("max_size", &self.max_size)
            .field("compress", &self.compress)
            .field("backup_num", &self.backup_num)
            .field("backup_time", &self.backup_time)
            .field("namer", &self.namer.is_some())
            .finish_non_exhaustive()
    }
}

impl HandlerConfig {
    /// Defaults for `logfile`: all levels, text, 256 KiB line buffer, hourly or 20 MiB
    /// rotation, 20 backups kept for a week.
    #[must_use]
    pub fn new(logfile: impl Into<PathBuf>) -> Self {
        Self {
            logfile: logfile.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn levels(mut self, levels: impl Into<LevelFilter>) -> Self {
        self.levels = levels.into();
        self
    }

    #[must_use]
    pub const fn use_json(mut self, use_json: bool) -> Self {
        self.use_json = use_json;
        self
    }

    #[must_use]
    pub const fn buffer(mut self, mode: BufferMode, size: usize) -> Self {
        self.buff_mode = mode;
        self.buff_size = size;
        self
    }

    #[must_use]
    pub const fn rotate_time(mut self, rotate_time: Option<RotateTime>) -> Self {
        self.rotate_time = rotate_time;
        self
    }

    #[must_use]
    pub const fn max_size(mut self, bytes: u64) -> Self {
        self.max_size = bytes;
        self
    }

    #[must_use]
    pub const fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    #[must_use]
    pub const fn backup_num(mut self, num: usize) -> Self {
        self.backup_num = num;
        self
    }

    #[must_use]
    pub const fn backup_hours(mut self, hours: u64) -> Self {
        self.backup_time = hours;
        self
    }

    #[must_use]
    pub fn namer<F>(mut self, namer: F) -> Self
    where
        F: Fn(&std::path::Path, &chrono::DateTime<chrono::Local>, u32) -> PathBuf
            + Send
            + Sync
            + 'static,
    {
        self.namer = Some(Arc::new(namer));
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    const fn rotates(&self) -> bool {
        self.max_size > 0 || self.rotate_time.is_some()
    }

    fn rotate_config(&self) -> RotateConfig {
        let hours = i64::try_from(self.backup_time).unwrap_or(i64::MAX / 3600);
        let mut rc = RotateConfig::new(&self.logfile)
            .max_size(self.max_size)
            .rotate_time(self.rotate_time)
            .backup_num(self.backup_num)
            .backup_time(Duration::try_hours(hours).unwrap_or(Duration::MAX))
            .compress(self.compress)
            // The handler serializes every write behind its own lock.
            .caller_locked(true);
        rc.namer.clone_from(&self.namer);
        if let Some(clock) = &self.clock {
            rc = rc.clock(Arc::clone(clock));
        }
        rc
    }

    /// Opens the configured file (rotating if either trigger is set) and wraps it
    /// in a buffer unless `buff_size` is 0.
    ///
    /// # Errors
    /// Empty `logfile`, or the file cannot be opened.
    pub fn create_writer(&self) -> Result<Box<dyn Sink>, Error> {
        if self.logfile.as_os_str().is_empty() {
            return Err(Error::config("logfile cannot be empty"));
        }

        if self.rotates() {
            let file = self.rotate_config().create()?;
            return self.wrap(file);
        }

        if let Some(parent) = self.logfile.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.logfile)?;
        self.wrap(file)
    }

    /// Like [`create_writer`](Self::create_writer), insisting on rotation.
    ///
    /// # Errors
    /// Both triggers disabled, empty `logfile`, or the file cannot be opened.
    pub fn rotate_writer(&self) -> Result<Box<dyn Sink>, Error> {
        if !self.rotates() {
            return Err(Error::config(
                "cannot create rotating writer: max_size and rotate_time are both disabled",
            ));
        }
        self.create_writer()
    }

    fn wrap<S: Sink + 'static>(&self, sink: S) -> Result<Box<dyn Sink>, Error> {
        if self.buff_size == 0 {
            return Ok(Box::new(sink));
        }
        Ok(Box::new(BufferedWriter::new(
            sink,
            self.buff_mode,
            self.buff_size,
        )?))
    }

    fn handler_for(&self, sink: Box<dyn Sink>) -> SinkHandler {
        let handler = SinkHandler::from_boxed(sink, self.levels);
        handler.set_formatter(formatter_for(self.use_json));
        handler
    }

    /// # Errors
    /// See [`create_writer`](Self::create_writer).
    pub fn create_handler(&self) -> Result<SinkHandler, Error> {
        Ok(self.handler_for(self.create_writer()?))
    }

    /// # Errors
    /// See [`rotate_writer`](Self::rotate_writer).
    pub fn rotating_handler(&self) -> Result<SinkHandler, Error> {
        Ok(self.handler_for(self.rotate_writer()?))
    }
}
