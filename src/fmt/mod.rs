//! Record-to-bytes rendering. Handlers own a formatter and call it outside their sink lock.

mod format;
mod json;
mod text;

pub use format::{FormatSegment, FormatTemplate, Placeholder};
pub use json::JsonFormatter;
pub use text::{DEFAULT_TEMPLATE, DEFAULT_TIME_FORMAT, TextFormatter};

use crate::Error;
use crate::record::Record;

/// Renders one record, appending a complete newline-terminated line to `buf`.
pub trait Formatter: Send + Sync {
    /// # Errors
    /// Serialization failures.
    fn format(&self, record: &Record, buf: &mut Vec<u8>) -> Result<(), Error>;
}

impl<F> Formatter for F
where
    F: Fn(&Record, &mut Vec<u8>) -> Result<(), Error> + Send + Sync,
{
    fn format(&self, record: &Record, buf: &mut Vec<u8>) -> Result<(), Error> {
        self(record, buf)
    }
}
