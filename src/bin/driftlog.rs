//! Usage:
//!   driftlog pipe <logfile> [options]     Log stdin lines into a rotating file
//!   driftlog backups <logfile>            List rotated backups
//!   driftlog prune <logfile> [options]    Apply retention limits once

use clap::Parser;
use driftlog::cli::commands::PipeOptions;
use driftlog::cli::{Cli, Command, cmd_backups, cmd_pipe, cmd_prune};
use driftlog::internal;
use driftlog::level::Level;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Must precede the first diagnostic, or the default level sticks.
    internal::init(if cli.verbose { Level::Debug } else { Level::Warn });

    match &cli.command {
        Command::Pipe {
            logfile,
            level,
            max_size,
            rotate,
            retention,
            compress,
            buffer,
            json,
            flush_secs,
            name,
        } => cmd_pipe(&PipeOptions {
            logfile,
            level: *level,
            max_size,
            rotate,
            retention: *retention,
            compress: *compress,
            buffer,
            json: *json,
            flush_secs: *flush_secs,
            name,
        }),
        Command::Backups { logfile } => cmd_backups(logfile),
        Command::Prune { logfile, retention } => cmd_prune(logfile, *retention),
    }
}
