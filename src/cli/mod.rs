//! Command-line interface for driftlog, built on Clap.

pub mod commands;

pub use commands::{cmd_backups, cmd_pipe, cmd_prune};

use crate::level::Level;
use crate::rotate::{DEFAULT_BACKUP_HOURS, DEFAULT_BACKUP_NUM};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Log level for CLI arguments.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Notice,
    Warn,
    Error,
    Fatal,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::Trace,
            LogLevel::Debug => Self::Debug,
            LogLevel::Info => Self::Info,
            LogLevel::Notice => Self::Notice,
            LogLevel::Warn => Self::Warn,
            LogLevel::Error => Self::Error,
            LogLevel::Fatal => Self::Fatal,
        }
    }
}

/// driftlog - Buffered, rotating log files from the command line.
#[derive(Parser)]
#[command(name = "driftlog", version, about = "Buffered, rotating log files")]
pub struct Cli {
    /// Show internal diagnostics at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Retention limits shared by `pipe` and `prune`.
#[derive(Debug, Clone, Copy, clap::Args)]
pub struct RetentionArgs {
    /// Keep at most N backups (0 keeps all)
    #[arg(long, value_name = "N", default_value_t = DEFAULT_BACKUP_NUM)]
    pub backups: usize,
    /// Delete backups older than H hours (0 keeps all)
    #[arg(long, value_name = "H", default_value_t = DEFAULT_BACKUP_HOURS)]
    pub backup_hours: u64,
}

/// CLI subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Log every line read from stdin into a rotating file.
    Pipe {
        /// Live log file
        logfile: PathBuf,
        /// Level given to each line
        #[arg(long, value_enum, default_value = "info")]
        level: LogLevel,
        /// Rotate before the file would exceed SIZE (e.g. "10M"; "0" disables)
        #[arg(long, value_name = "SIZE", default_value = "20M")]
        max_size: String,
        /// Rotate on entering a new second/minute/hour/day/month ("none" disables)
        #[arg(long, value_name = "PERIOD", default_value = "hour")]
        rotate: String,
        #[command(flatten)]
        retention: RetentionArgs,
        /// Gzip rotated backups
        #[arg(long)]
        compress: bool,
        /// Buffer capacity (e.g. "64K"; "0" writes through)
        #[arg(long, value_name = "SIZE", default_value = "256K")]
        buffer: String,
        /// Write JSON lines instead of text
        #[arg(long)]
        json: bool,
        /// Flush every S seconds (0 only flushes at exit)
        #[arg(long, value_name = "S", default_value_t = 1)]
        flush_secs: u64,
        /// Channel name stamped on each record
        #[arg(long, default_value = "pipe")]
        name: String,
    },
    /// List the rotated backups of a log file.
    Backups {
        /// Live log file
        logfile: PathBuf,
    },
    /// Apply retention limits to the backups of a log file once.
    Prune {
        /// Live log file
        logfile: PathBuf,
        #[command(flatten)]
        retention: RetentionArgs,
    },
}
