use super::{DEFAULT_NAME, Dispatch, Inner, Logger, Processor, TerminalAction};
use crate::Error;
use crate::buffer::BufferMode;
use crate::handler::{Handler, HandlerConfig, console_handler};
use crate::level::{Level, LevelFilter};
use crate::record::{DEFAULT_POOL_CAPACITY, RecordPool};
use crate::rotate::{Clock, RotateTime, SystemClock};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

pub struct LoggerBuilder {
    name: String,
    min_level: Level,
    report_caller: bool,
    diagnostics: bool,
    clock: Arc<dyn Clock>,
    terminal: TerminalAction,
    handlers: Vec<Arc<dyn Handler>>,
    processors: Vec<Arc<dyn Processor>>,
    pool_capacity: usize,
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggerBuilder {
    /// Channel `"application"`, every level, caller reporting on, process-level
    /// terminal action.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            min_level: Level::Trace,
            report_caller: true,
            diagnostics: true,
            clock: Arc::new(SystemClock),
            terminal: TerminalAction::Process,
            handlers: Vec::new(),
            processors: Vec::new(),
            pool_capacity: DEFAULT_POOL_CAPACITY,
        }
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Records below `level` are dropped before processors or handlers see them.
    #[must_use]
    pub const fn level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    #[must_use]
    pub const fn report_caller(mut self, report: bool) -> Self {
        self.report_caller = report;
        self
    }

    /// Whether handler failures are echoed to the crate's diagnostic logger.
    #[must_use]
    pub(crate) const fn diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn terminal_action(mut self, action: TerminalAction) -> Self {
        self.terminal = action;
        self
    }

    #[must_use]
    pub fn handler(mut self, handler: impl Handler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    #[must_use]
    pub fn handlers(mut self, handlers: impl IntoIterator<Item = Arc<dyn Handler>>) -> Self {
        self.handlers.extend(handlers);
        self
    }

    #[must_use]
    pub fn processor(mut self, processor: impl Processor + 'static) -> Self {
        self.processors.push(Arc::new(processor));
        self
    }

    /// Records kept for reuse between calls.
    #[must_use]
    pub const fn pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    /// Adds a text handler on stdout.
    #[must_use]
    pub fn console(self, filter: impl Into<LevelFilter>) -> Self {
        self.handler(console_handler(filter))
    }

    /// Starts a file handler; finish it with [`FileBuilder::done`].
    #[must_use]
    pub fn file(self, path: impl Into<PathBuf>) -> FileBuilder {
        FileBuilder {
            parent: self,
            config: HandlerConfig::new(path),
        }
    }

    #[must_use]
    pub fn build(self) -> Logger {
        Logger {
            inner: Arc::new(Inner {
                name: self.name,
                min_level: self.min_level,
                report_caller: self.report_caller,
                diagnostics: self.diagnostics,
                clock: self.clock,
                terminal: RwLock::new(self.terminal),
                processors: RwLock::new(self.processors),
                dispatch: Mutex::new(Dispatch {
                    handlers: self.handlers,
                    last_err: None,
                }),
                pool: Mutex::new(RecordPool::with_capacity(self.pool_capacity)),
                exit_handlers: Mutex::new(Vec::new()),
            }),
        }
    }
}

/// File handler settings, chained off [`LoggerBuilder::file`].
pub struct FileBuilder {
    parent: LoggerBuilder,
    config: HandlerConfig,
}

impl FileBuilder {
    #[must_use]
    pub fn levels(mut self, levels: impl Into<LevelFilter>) -> Self {
        self.config = self.config.levels(levels);
        self
    }

    #[must_use]
    pub fn json(mut self) -> Self {
        self.config = self.config.use_json(true);
        self
    }

    #[must_use]
    pub fn buffer(mut self, mode: BufferMode, size: usize) -> Self {
        self.config = self.config.buffer(mode, size);
        self
    }

    #[must_use]
    pub fn max_size(mut self, bytes: u64) -> Self {
        self.config = self.config.max_size(bytes);
        self
    }

    #[must_use]
    pub fn rotate_time(mut self, rotate_time: Option<RotateTime>) -> Self {
        self.config = self.config.rotate_time(rotate_time);
        self
    }

    #[must_use]
    pub fn backups(mut self, num: usize, hours: u64) -> Self {
        self.config = self.config.backup_num(num).backup_hours(hours);
        self
    }

    #[must_use]
    pub fn compress(mut self, compress: bool) -> Self {
        self.config = self.config.compress(compress);
        self
    }

    /// Opens the file and returns to the logger builder.
    ///
    /// # Errors
    /// See [`HandlerConfig::create_handler`].
    pub fn done(self) -> Result<LoggerBuilder, Error> {
        let clock = Arc::clone(&self.parent.clock);
        let handler = self.config.clock(clock).create_handler()?;
        Ok(self.parent.handler(handler))
    }
}
