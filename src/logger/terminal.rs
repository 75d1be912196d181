use std::fmt;
use std::sync::Arc;

/// What a fatal or panic record asks of the process once it has been written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    Exit(i32),
    Panic(String),
}

pub type TerminalCallback = Arc<dyn Fn(Terminal) + Send + Sync>;

/// Runs after fatal/panic records are dispatched and flushed.
#[derive(Clone, Default)]
pub enum TerminalAction {
    /// `Exit` ends the process, `Panic` panics the calling thread.
    #[default]
    Process,
    /// Records are written; nothing else happens. Meant for tests.
    Noop,
    Custom(TerminalCallback),
}

impl TerminalAction {
    pub fn custom<F: Fn(Terminal) + Send + Sync + 'static>(callback: F) -> Self {
        Self::Custom(Arc::new(callback))
    }

    pub(crate) fn run(&self, terminal: Terminal) {
        match self {
            Self::Process => match terminal {
                Terminal::Exit(code) => std::process::exit(code),
                Terminal::Panic(message) => panic!("{message}"),
            },
            Self::Noop => {}
            Self::Custom(callback) => callback(terminal),
        }
    }
}

impl fmt::Debug for TerminalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Process => f.write_str("Process"),
            Self::Noop => f.write_str("Noop"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
