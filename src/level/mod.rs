//! Severity levels and the filters handlers use to accept or skip records.

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Ordered by increasing severity so a minimum-level filter is a plain comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Level {
    /// High-volume instrumentation.
    Trace = 0,
    /// Diagnostic detail for development.
    Debug = 1,
    /// Normal operational milestones.
    #[default]
    Info = 2,
    /// Noteworthy but normal events; also used by `print`.
    Notice = 3,
    /// Non-fatal anomalies.
    Warn = 4,
    /// Failures of a single operation.
    Error = 5,
    /// Emitted, then the logger's terminal action exits the process.
    Fatal = 6,
    /// Emitted, then the logger's terminal action panics.
    Panic = 7,
}

impl Level {
    /// Uppercase names are what the text and JSON formatters print.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Notice => "NOTICE",
            Self::Warn => "WARNING",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
            Self::Panic => "PANIC",
        }
    }

    /// Lowercase because config files and CLI args use lowercase level strings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Notice => "notice",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fatal => "fatal",
            Self::Panic => "panic",
        }
    }

    /// Levels that hand control to the terminal action after the fan-out.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Fatal | Self::Panic)
    }

    /// All levels from least to most severe.
    #[must_use]
    pub const fn all() -> [Self; 8] {
        [
            Self::Trace,
            Self::Debug,
            Self::Info,
            Self::Notice,
            Self::Warn,
            Self::Error,
            Self::Fatal,
            Self::Panic,
        ]
    }

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned by `FromStr` so callers can distinguish "unknown level" from other parse failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLevelError(String);

impl fmt::Display for ParseLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown log level: '{}'", self.0)
    }
}

impl std::error::Error for ParseLevelError {}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "notice" | "print" => Ok(Self::Notice),
            "warn" | "warning" => Ok(Self::Warn),
            "error" | "err" => Ok(Self::Error),
            "fatal" => Ok(Self::Fatal),
            "panic" => Ok(Self::Panic),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A set of levels packed into one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LevelSet(u8);

impl LevelSet {
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn all() -> Self {
        Self(u8::MAX)
    }

    /// Every level at or above `min`.
    #[must_use]
    pub const fn at_least(min: Level) -> Self {
        Self(u8::MAX << (min as u8))
    }

    #[must_use]
    pub const fn with(self, level: Level) -> Self {
        Self(self.0 | level.bit())
    }

    #[must_use]
    pub const fn contains(self, level: Level) -> bool {
        self.0 & level.bit() != 0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Members in ascending severity.
    pub fn iter(self) -> impl Iterator<Item = Level> {
        Level::all().into_iter().filter(move |l| self.contains(*l))
    }
}

impl FromIterator<Level> for LevelSet {
    fn from_iter<I: IntoIterator<Item = Level>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

impl<const N: usize> From<[Level; N]> for LevelSet {
    fn from(levels: [Level; N]) -> Self {
        levels.into_iter().collect()
    }
}

/// Which records a handler accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelFilter {
    /// Accept every record at or above the level.
    Min(Level),
    /// Accept exactly the listed levels.
    Set(LevelSet),
}

impl LevelFilter {
    #[must_use]
    pub const fn all() -> Self {
        Self::Set(LevelSet::all())
    }

    #[must_use]
    pub const fn accepts(&self, level: Level) -> bool {
        match self {
            Self::Min(min) => level as u8 >= *min as u8,
            Self::Set(set) => set.contains(level),
        }
    }
}

impl Default for LevelFilter {
    fn default() -> Self {
        Self::all()
    }
}

impl From<Level> for LevelFilter {
    fn from(min: Level) -> Self {
        Self::Min(min)
    }
}

impl From<LevelSet> for LevelFilter {
    fn from(set: LevelSet) -> Self {
        Self::Set(set)
    }
}

impl<const N: usize> From<[Level; N]> for LevelFilter {
    fn from(levels: [Level; N]) -> Self {
        Self::Set(levels.into())
    }
}

/// `"warn"` is a minimum level, `["error", "fatal"]` an exact set.
impl<'de> Deserialize<'de> for LevelFilter {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Min(Level),
            Set(Vec<Level>),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Min(level) => Self::Min(level),
            Raw::Set(levels) => Self::Set(levels.into_iter().collect()),
        })
    }
}
