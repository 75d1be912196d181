//! Configuration struct definitions.

use crate::level::Level;
use crate::logger::DEFAULT_NAME;
use serde::Deserialize;

/// Settings of the logger itself.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Channel name stamped on every record.
    pub name: String,
    /// Record the source location of each logging call.
    pub report_caller: bool,
    /// Records below this level are dropped before any handler.
    pub level: Level,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            report_caller: true,
            level: Level::Trace,
        }
    }
}
