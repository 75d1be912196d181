//! `driftlog` - Structured logging into buffered, rotating files.
//!
//! A logger fans each record out to its handlers. A handler filters by level,
//! formats, and writes to a sink. File sinks can be buffered and rotated by size
//! or calendar period, with retention by count and age and optional gzip.
//!
//! # Example
//!
//! ```
//! use driftlog::{Level, Logger, MemorySink, SinkHandler, TextFormatter};
//!
//! let sink = MemorySink::new();
//! let logger = Logger::builder()
//!     .name("api")
//!     .handler(
//!         SinkHandler::new(sink.clone(), Level::Info)
//!             .with_formatter(TextFormatter::new().template("{level} {message}")),
//!     )
//!     .build();
//!
//! logger.debug("dropped");
//! logger.info("listening");
//! logger.record().field("port", 8080).warn("slow start");
//! logger.close().unwrap();
//!
//! assert_eq!(sink.lines(), ["INFO listening", "WARNING slow start"]);
//! ```
//!
//! # Features
//!
//! - `cli` (default): the `driftlog` command-line tool

pub mod buffer;
pub mod config;
mod error;
pub mod fmt;
pub mod handler;
pub mod internal;
pub mod level;
pub mod logger;
pub mod record;
pub mod rotate;
pub mod sink;
pub mod size;

#[cfg(feature = "cli")]
pub mod cli;

pub use buffer::{BufferMode, BufferedWriter};
pub use config::Config;
pub use error::Error;
pub use fmt::{Formatter, JsonFormatter, TextFormatter};
pub use handler::{Handler, HandlerConfig, SinkHandler};
pub use level::{Level, LevelFilter, LevelSet};
pub use logger::{FlushOutcome, Logger, LoggerBuilder, TerminalAction};
pub use record::Record;
pub use rotate::{RotateConfig, RotateTime, RotatingFile};
pub use sink::{Capability, MemorySink, Sink};
pub use size::{format_size, parse_size};
