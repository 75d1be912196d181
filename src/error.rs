//! Unified error type for all driftlog operations.

use std::path::PathBuf;
use std::sync::Arc;

/// Error type for driftlog operations.
///
/// `Clone` so one failure can be both returned to the caller and kept as the
/// logger's last error; I/O errors are shared behind an `Arc` for that reason.
#[derive(Debug, Clone)]
pub enum Error {
    /// I/O error.
    Io(Arc<std::io::Error>),
    /// TOML config parsing error.
    ConfigParse(Arc<toml::de::Error>),
    /// Config directory not found.
    ConfigDirNotFound,
    /// Invalid configuration, rejected at construction time.
    Config(String),
    /// Format/serialization error.
    Format(String),
    /// Renaming the live file to its backup name failed; the write went to the old file.
    Rotate {
        path: PathBuf,
        source: Arc<std::io::Error>,
    },
    /// Background compression of a backup failed.
    Compress {
        path: PathBuf,
        source: Arc<std::io::Error>,
    },
    /// The sink was already closed.
    Closed,
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub(crate) fn rotate(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Rotate {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    pub(crate) fn compress(path: impl Into<PathBuf>, source: Self) -> Self {
        let source = match source {
            Self::Io(e) | Self::Rotate { source: e, .. } | Self::Compress { source: e, .. } => e,
            other => Arc::new(std::io::Error::other(other.to_string())),
        };
        Self::Compress {
            path: path.into(),
            source,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::ConfigParse(e) => write!(f, "parse error: {e}"),
            Self::ConfigDirNotFound => write!(f, "config directory not found"),
            Self::Config(s) => write!(f, "invalid config: {s}"),
            Self::Format(s) => write!(f, "format error: {s}"),
            Self::Rotate { path, source } => {
                write!(f, "rotate {} failed: {source}", path.display())
            }
            Self::Compress { path, source } => {
                write!(f, "compress {} failed: {source}", path.display())
            }
            Self::Closed => write!(f, "sink is closed"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) | Self::Rotate { source: e, .. } | Self::Compress { source: e, .. } => {
                Some(e.as_ref())
            }
            Self::ConfigParse(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(Arc::new(e))
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Self::ConfigParse(Arc::new(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Format(e.to_string())
    }
}
