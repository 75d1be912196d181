//! Size- and time-based rotation of a single live log file, with count/age
//! retention and optional gzip compression of rotated backups.
//!
//! A [`RotatingFile`] is checked on every write: if the write would push the live
//! file past `max_size`, or the clock has moved into a later time bucket, the
//! live file is renamed to a backup name, a fresh file is opened in its place,
//! and a retention pass prunes old backups.

mod backup;
mod clock;
mod compress;
mod engine;
mod retention;

pub use backup::{BackupFile, default_backup_name, list_backups};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::RotatingFile;
pub use retention::{RetentionPolicy, RetentionResult, prune};

use crate::Error;
use crate::sink::{Shared, Sink};
use chrono::{DateTime, Duration, Local};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Backup count kept when nothing else is configured.
pub const DEFAULT_BACKUP_NUM: usize = 20;
/// Backup age kept when nothing else is configured, in hours (one week).
pub const DEFAULT_BACKUP_HOURS: u64 = 24 * 7;

/// Granularity of time-based rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RotateTime {
    Second,
    Minute,
    Hour,
    Day,
    Month,
}

impl RotateTime {
    const fn bucket_format(self) -> &'static str {
        match self {
            Self::Second => "%Y%m%d%H%M%S",
            Self::Minute => "%Y%m%d%H%M",
            Self::Hour => "%Y%m%d%H",
            Self::Day => "%Y%m%d",
            Self::Month => "%Y%m",
        }
    }

    /// `time` truncated to this granularity, as a fixed-width key that sorts
    /// chronologically.
    #[must_use]
    pub fn bucket(self, time: &DateTime<Local>) -> String {
        time.format(self.bucket_format()).to_string()
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Month => "month",
        }
    }
}

impl fmt::Display for RotateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RotateTime {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "second" | "secondly" | "1s" => Ok(Self::Second),
            "minute" | "minutely" | "1m" => Ok(Self::Minute),
            "hour" | "hourly" | "1h" => Ok(Self::Hour),
            "day" | "daily" | "1d" => Ok(Self::Day),
            "month" | "monthly" => Ok(Self::Month),
            _ => Err(Error::config(format!("unknown rotate time: '{s}'"))),
        }
    }
}

impl<'de> Deserialize<'de> for RotateTime {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A rotating file behind its own lock, for callers that do not serialize writes themselves.
pub type SharedRotatingFile = Shared<RotatingFile>;

/// Builds the backup path from the live path, the rotation time, and a sequence number.
pub type BackupNamer = Arc<dyn Fn(&Path, &DateTime<Local>, u32) -> PathBuf + Send + Sync>;

/// Settings of one rotating file; immutable once the file is created.
#[derive(Clone)]
pub struct RotateConfig {
    pub path: PathBuf,
    /// Rotate before a write would take the live file past this many bytes; 0 disables.
    pub max_size: u64,
    /// Rotate when the clock enters a later bucket; `None` disables.
    pub rotate_time: Option<RotateTime>,
    /// Backups to keep; 0 keeps all.
    pub backup_num: usize,
    /// Maximum backup age; zero keeps all.
    pub backup_time: Duration,
    /// Gzip each backup on a background thread.
    pub compress: bool,
    /// Custom backup naming. Existing backups are only rediscovered with the default names.
    pub namer: Option<BackupNamer>,
    /// The owner already serializes access (e.g. a handler lock), so no internal lock is added.
    pub caller_locked: bool,
    pub clock: Arc<dyn Clock>,
}

impl fmt::Debug for RotateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotateConfig")
            .field("path", &self.path)
            .field("max_size", &self.max_size)
            .field("rotate_time", &self.rotate_time)
            .field("backup_num", &self.backup_num)
            .field("backup_time", &self.backup_time)
            .field("compress", &self.compress)
            .field("namer", &self.namer.is_some())
            .field("caller_locked", &self.caller_locked)
            .field("clock", &self.clock)
            .finish()
    }
}

impl RotateConfig {
    /// Hourly rotation, no size limit, 20 backups kept for at most a week, no compression.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_size: 0,
            rotate_time: Some(RotateTime::Hour),
            backup_num: DEFAULT_BACKUP_NUM,
            #[allow(clippy::cast_possible_wrap)]
            backup_time: Duration::hours(DEFAULT_BACKUP_HOURS as i64),
            compress: false,
            namer: None,
            caller_locked: false,
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub const fn max_size(mut self, bytes: u64) -> Self {
        self.max_size = bytes;
        self
    }

    #[must_use]
    pub const fn rotate_time(mut self, rotate_time: Option<RotateTime>) -> Self {
        self.rotate_time = rotate_time;
        self
    }

    #[must_use]
    pub const fn backup_num(mut self, num: usize) -> Self {
        self.backup_num = num;
        self
    }

    #[must_use]
    pub const fn backup_time(mut self, age: Duration) -> Self {
        self.backup_time = age;
        self
    }

    #[must_use]
    pub const fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    #[must_use]
    pub fn namer<F>(mut self, namer: F) -> Self
    where
        F: Fn(&Path, &DateTime<Local>, u32) -> PathBuf + Send + Sync + 'static,
    {
        self.namer = Some(Arc::new(namer));
        self
    }

    #[must_use]
    pub const fn caller_locked(mut self, locked: bool) -> Self {
        self.caller_locked = locked;
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub const fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            backup_num: self.backup_num,
            backup_time: self.backup_time,
        }
    }

    /// # Errors
    /// Empty path, or both rotation triggers disabled.
    pub fn validate(&self) -> Result<(), Error> {
        if self.path.as_os_str().is_empty() {
            return Err(Error::config("rotate file path cannot be empty"));
        }
        if self.max_size == 0 && self.rotate_time.is_none() {
            return Err(Error::config(
                "cannot create rotating file: max_size and rotate_time are both disabled",
            ));
        }
        Ok(())
    }

    /// Opens the rotating file.
    ///
    /// # Errors
    /// Invalid configuration or failure to open the live file.
    pub fn create(self) -> Result<RotatingFile, Error> {
        RotatingFile::new(self)
    }

    /// Opens the rotating file as a boxed sink, behind its own lock unless
    /// `caller_locked` says the owner already holds one.
    ///
    /// # Errors
    /// Invalid configuration or failure to open the live file.
    pub fn create_sink(self) -> Result<Box<dyn Sink>, Error> {
        let locked = self.caller_locked;
        let file = self.create()?;
        if locked {
            Ok(Box::new(file))
        } else {
            Ok(Box::new(Shared::new(file)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn buckets_sort_chronologically() {
        let a = Local.with_ymd_and_hms(2024, 9, 30, 23, 59, 59).unwrap();
        let b = Local.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap();
        for rt in [
            RotateTime::Second,
            RotateTime::Minute,
            RotateTime::Hour,
            RotateTime::Day,
            RotateTime::Month,
        ] {
            assert!(rt.bucket(&b) > rt.bucket(&a), "{rt}");
        }
    }

    #[test]
    fn same_hour_shares_a_bucket() {
        let a = Local.with_ymd_and_hms(2024, 5, 1, 10, 0, 1).unwrap();
        let b = Local.with_ymd_and_hms(2024, 5, 1, 10, 59, 59).unwrap();
        assert_eq!(RotateTime::Hour.bucket(&a), RotateTime::Hour.bucket(&b));
        assert_ne!(RotateTime::Minute.bucket(&a), RotateTime::Minute.bucket(&b));
    }

    #[test]
    fn both_triggers_disabled_is_rejected() {
        let config = RotateConfig::new("/tmp/x.log").rotate_time(None);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        assert!(config.max_size(10).validate().is_ok());
    }

    #[test]
    fn parses_rotate_time_names() {
        assert_eq!("hourly".parse::<RotateTime>().unwrap(), RotateTime::Hour);
        assert_eq!("Day".parse::<RotateTime>().unwrap(), RotateTime::Day);
        assert!("fortnight".parse::<RotateTime>().is_err());
    }
}
