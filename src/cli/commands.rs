use super::{LogLevel, RetentionArgs};
use crate::buffer::BufferMode;
use crate::fmt::TextFormatter;
use crate::handler::{HandlerConfig, SinkHandler};
use crate::internal;
use crate::level::{Level, LevelFilter};
use crate::logger::{Logger, TerminalAction};
use crate::rotate::{RotateTime, list_backups, prune};
use crate::size::{format_size, parse_size};
use chrono::Duration;
use std::io::{self, BufRead};
use std::path::Path;
use std::process::ExitCode;

/// Terminal output for command results.
fn console() -> Logger {
    Logger::builder()
        .name("driftlog")
        .report_caller(false)
        .terminal_action(TerminalAction::Noop)
        .handler(
            SinkHandler::new(io::stdout(), LevelFilter::all())
                .with_formatter(TextFormatter::new().template("{message}")),
        )
        .build()
}

fn hours(h: u64) -> Duration {
    i64::try_from(h)
        .ok()
        .and_then(Duration::try_hours)
        .unwrap_or(Duration::MAX)
}

pub struct PipeOptions<'a> {
    pub logfile: &'a Path,
    pub level: LogLevel,
    pub max_size: &'a str,
    pub rotate: &'a str,
    pub retention: RetentionArgs,
    pub compress: bool,
    pub buffer: &'a str,
    pub json: bool,
    pub flush_secs: u64,
    pub name: &'a str,
}

/// Copies stdin into a rotating log file, one record per line.
#[must_use]
pub fn cmd_pipe(opts: &PipeOptions<'_>) -> ExitCode {
    let Some(max_size) = parse_size(opts.max_size) else {
        internal::error("CLI", &format!("invalid --max-size: {}", opts.max_size));
        return ExitCode::FAILURE;
    };
    let Some(buffer) = parse_size(opts.buffer).and_then(|b| usize::try_from(b).ok()) else {
        internal::error("CLI", &format!("invalid --buffer: {}", opts.buffer));
        return ExitCode::FAILURE;
    };
    let rotate_time = match opts.rotate.to_lowercase().as_str() {
        "none" | "off" => None,
        other => match other.parse::<RotateTime>() {
            Ok(rt) => Some(rt),
            Err(e) => {
                internal::error("CLI", &e.to_string());
                return ExitCode::FAILURE;
            }
        },
    };

    let handler = HandlerConfig::new(opts.logfile)
        .max_size(max_size)
        .rotate_time(rotate_time)
        .backup_num(opts.retention.backups)
        .backup_hours(opts.retention.backup_hours)
        .compress(opts.compress)
        .buffer(BufferMode::Line, buffer)
        .use_json(opts.json)
        .create_handler();
    let handler = match handler {
        Ok(h) => h,
        Err(e) => {
            internal::error("CLI", &format!("cannot open {}: {e}", opts.logfile.display()));
            return ExitCode::FAILURE;
        }
    };

    let logger = Logger::builder()
        .name(opts.name)
        .report_caller(false)
        .terminal_action(TerminalAction::Noop)
        .handler(handler)
        .build();

    let daemon = if opts.flush_secs > 0 {
        match logger.flush_daemon(std::time::Duration::from_secs(opts.flush_secs)) {
            Ok(d) => Some(d),
            Err(e) => {
                internal::warn("CLI", &format!("no background flush: {e}"));
                None
            }
        }
    } else {
        None
    };

    let level = Level::from(opts.level);
    let mut lines = 0_u64;
    for line in io::stdin().lock().lines() {
        match line {
            Ok(line) => {
                logger.log(level, line);
                lines += 1;
            }
            Err(e) => {
                internal::error("CLI", &format!("reading stdin: {e}"));
                break;
            }
        }
    }

    if let Some(daemon) = daemon {
        daemon.stop();
    }
    let closed = logger.close();
    internal::debug("CLI", &format!("piped {lines} line(s)"));

    match closed {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            internal::error("CLI", &format!("closing {}: {e}", opts.logfile.display()));
            ExitCode::FAILURE
        }
    }
}

#[must_use]
pub fn cmd_backups(logfile: &Path) -> ExitCode {
    let backups = match list_backups(logfile) {
        Ok(b) => b,
        Err(e) => {
            internal::error("CLI", &e.to_string());
            return ExitCode::FAILURE;
        }
    };

    let out = console();
    if backups.is_empty() {
        out.info(format_args!("no backups of {}", logfile.display()));
        return ExitCode::SUCCESS;
    }
    let total: u64 = backups.iter().map(|b| b.size).sum();
    for backup in &backups {
        out.info(format_args!(
            "{}  {:>10}  {}",
            backup.created.format("%Y-%m-%d %H:%M:%S"),
            format_size(backup.size),
            backup.path.display()
        ));
    }
    out.notice(format_args!(
        "{} backup(s), {}",
        backups.len(),
        format_size(total)
    ));
    ExitCode::SUCCESS
}

#[must_use]
pub fn cmd_prune(logfile: &Path, retention: RetentionArgs) -> ExitCode {
    match prune(logfile, retention.backups, hours(retention.backup_hours)) {
        Ok(result) => {
            result.log(&console());
            if result.failed.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            internal::error("CLI", &e.to_string());
            ExitCode::FAILURE
        }
    }
}
