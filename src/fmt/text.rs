//! Plain-text line formatter.

use super::{FormatTemplate, Formatter};
use crate::Error;
use crate::record::Record;

pub const DEFAULT_TEMPLATE: &str = "[{datetime}] [{channel}] [{level}] {message} {fields} {data} {extra}";
pub const DEFAULT_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S%.3f";

#[derive(Debug, Clone)]
pub struct TextFormatter {
    template: FormatTemplate,
    time_format: String,
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl TextFormatter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            template: FormatTemplate::parse(DEFAULT_TEMPLATE),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }

    /// Line layout, e.g. `"{level} {message}"`. The newline is always appended.
    #[must_use]
    pub fn template(mut self, template: &str) -> Self {
        self.template = FormatTemplate::parse(template);
        self
    }

    /// strftime format for `{datetime}`.
    #[must_use]
    pub fn time_format(mut self, format: impl Into<String>) -> Self {
        self.time_format = format.into();
        self
    }
}

impl Formatter for TextFormatter {
    fn format(&self, record: &Record, buf: &mut Vec<u8>) -> Result<(), Error> {
        let mut line = String::with_capacity(128);
        self.template.render_into(record, &self.time_format, &mut line)?;
        line.push('\n');
        buf.extend_from_slice(line.as_bytes());
        Ok(())
    }
}
