//! One JSON object per line, for consumers that grep with `jq` instead of eyes.

use super::Formatter;
use super::format::write_time;
use crate::Error;
use crate::record::{Fields, Record};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct JsonEntry<'a> {
    datetime: String,
    channel: &'a str,
    level: &'static str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    caller: Option<String>,
    #[serde(skip_serializing_if = "is_empty")]
    fields: &'a Fields,
    data: &'a Fields,
    extra: &'a Fields,
}

fn is_empty(map: &&Fields) -> bool {
    map.is_empty()
}

#[derive(Debug, Clone)]
pub struct JsonFormatter {
    time_format: String,
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonFormatter {
    /// RFC 3339 timestamps by default.
    #[must_use]
    pub fn new() -> Self {
        Self {
            time_format: "%+".to_string(),
        }
    }

    #[must_use]
    pub fn time_format(mut self, format: impl Into<String>) -> Self {
        self.time_format = format.into();
        self
    }
}

impl Formatter for JsonFormatter {
    fn format(&self, record: &Record, buf: &mut Vec<u8>) -> Result<(), Error> {
        let mut datetime = String::new();
        write_time(&mut datetime, &record.time, &self.time_format)?;
        let entry = JsonEntry {
            datetime,
            channel: &record.channel,
            level: record.level.name(),
            message: &record.message,
            caller: record.caller.map(|c| c.to_string()),
            fields: &record.fields,
            data: &record.data,
            extra: &record.extra,
        };
        serde_json::to_writer(&mut *buf, &entry)?;
        buf.push(b'\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;

    #[test]
    fn renders_one_object_per_line() {
        let mut record = Record::new(Level::Error, "db down");
        record.channel.push_str("api");
        record.add_field("attempt", 3);
        let mut buf = Vec::new();
        JsonFormatter::new().format(&record, &mut buf).unwrap();

        assert_eq!(buf.last(), Some(&b'\n'));
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["level"], "ERROR");
        assert_eq!(value["message"], "db down");
        assert_eq!(value["channel"], "api");
        assert_eq!(value["fields"]["attempt"], 3);
        assert!(value.get("caller").is_none());
    }

    #[test]
    fn bad_time_format_fails_without_output() {
        let record = Record::new(Level::Info, "x");
        let mut buf = Vec::new();
        let err = JsonFormatter::new().time_format("%Q").format(&record, &mut buf);
        assert!(matches!(err, Err(Error::Format(_))));
        assert!(buf.is_empty());
    }
}
