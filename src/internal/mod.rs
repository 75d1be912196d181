//! The crate's own diagnostic logger: rotation events, handler failures, and
//! anything else that cannot go through the logger it concerns.
//!
//! Built from this crate's parts (a text handler on stderr) on first use, at
//! warning level unless [`init`] picked another. It never reports into itself.

use crate::fmt::TextFormatter;
use crate::handler::SinkHandler;
use crate::level::Level;
use crate::logger::{Logger, TerminalAction};
use std::io;
use std::sync::OnceLock;

static INTERNAL_LOGGER: OnceLock<Logger> = OnceLock::new();

const DEFAULT_LEVEL: Level = Level::Warn;
const TEMPLATE: &str = "[{datetime}] [{channel}] [{level}] {message}";

fn build(level: Level) -> Logger {
    let handler = SinkHandler::new(io::stderr(), level)
        .with_formatter(TextFormatter::new().template(TEMPLATE));
    Logger::builder()
        .name("driftlog")
        .level(level)
        .report_caller(false)
        .diagnostics(false)
        .terminal_action(TerminalAction::Noop)
        .handler(handler)
        .build()
}

/// Sets the diagnostic level. Only the first call, before any diagnostic was
/// emitted, takes effect; returns whether this call did.
pub fn init(level: Level) -> bool {
    let mut installed = false;
    INTERNAL_LOGGER.get_or_init(|| {
        installed = true;
        build(level)
    });
    if installed {
        debug("INTERNAL", &format!("diagnostics at {level}"));
    }
    installed
}

fn log(level: Level, scope: &str, msg: &str) {
    let logger = INTERNAL_LOGGER.get_or_init(|| build(DEFAULT_LEVEL));
    if level >= logger.min_level() {
        logger.logf(level, format_args!("{scope}: {msg}"));
    }
}

pub fn trace(scope: &str, msg: &str) {
    log(Level::Trace, scope, msg);
}

pub fn debug(scope: &str, msg: &str) {
    log(Level::Debug, scope, msg);
}

pub fn info(scope: &str, msg: &str) {
    log(Level::Info, scope, msg);
}

pub fn warn(scope: &str, msg: &str) {
    log(Level::Warn, scope, msg);
}

pub fn error(scope: &str, msg: &str) {
    log(Level::Error, scope, msg);
}
