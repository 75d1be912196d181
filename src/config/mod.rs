//! TOML configuration for a logger and its file handlers.
//!
//! ```toml
//! [logger]
//! name = "api"
//! level = "info"
//!
//! [[handlers]]
//! logfile = "~/.local/state/api/api.log"
//! levels = "info"
//! max_size = "10M"
//! rotate_time = "day"
//! backup_num = 7
//! compress = true
//!
//! [[handlers]]
//! logfile = "~/.local/state/api/error.log"
//! levels = ["error", "fatal", "panic"]
//! use_json = true
//! ```

mod structs;

pub use structs::LoggerConfig;

use crate::Error;
use crate::handler::{Handler, HandlerConfig};
use crate::internal;
use crate::logger::Logger;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An empty file is a valid config: one logger named `"application"` with no handlers.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logger: LoggerConfig,
    pub handlers: Vec<HandlerConfig>,
}

impl Config {
    /// Reads `<config dir>/driftlog/config.toml`; a missing file yields defaults.
    ///
    /// # Errors
    /// No config directory on this platform, unreadable file, or invalid TOML.
    pub fn load() -> Result<Self, Error> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Reads a config from `path`, expanding a leading `~`.
    ///
    /// # Errors
    /// Unreadable file or invalid TOML.
    pub fn load_from(path: &Path) -> Result<Self, Error> {
        let path = expand(path);
        if !path.exists() {
            internal::debug(
                "CONFIG",
                &format!("{} not found, using defaults", path.display()),
            );
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)?;
        let config = Self::from_toml(&content)?;
        internal::debug(
            "CONFIG",
            &format!(
                "Loaded {} ({} handlers)",
                path.display(),
                config.handlers.len()
            ),
        );
        Ok(config)
    }

    /// # Errors
    /// Invalid TOML or field values.
    pub fn from_toml(content: &str) -> Result<Self, Error> {
        let mut config: Self = toml::from_str(content)?;
        for handler in &mut config.handlers {
            handler.logfile = expand(&handler.logfile);
        }
        Ok(config)
    }

    /// # Errors
    /// The platform has no config directory.
    pub fn config_path() -> Result<PathBuf, Error> {
        directories::BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("driftlog").join("config.toml"))
            .ok_or(Error::ConfigDirNotFound)
    }

    /// Builds the logger with every configured handler.
    ///
    /// # Errors
    /// The first handler that cannot be created.
    pub fn build(&self) -> Result<Logger, Error> {
        let handlers = self
            .handlers
            .iter()
            .map(|h| h.create_handler().map(|h| Arc::new(h) as Arc<dyn Handler>))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Logger::builder()
            .name(self.logger.name.clone())
            .level(self.logger.level)
            .report_caller(self.logger.report_caller)
            .handlers(handlers)
            .build())
    }
}

fn expand(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(raw.as_ref()).into_owned())
}
