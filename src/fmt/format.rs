//! Pre-parsed line templates: `"[{datetime}] [{level}] {message}"` is split into
//! literal and placeholder segments once, then rendered for every record.

use crate::Error;
use crate::record::{Fields, Record};
use chrono::{DateTime, Local};
use std::fmt::Write as _;

/// Closed set of known substitution tokens; unknown `{names}` pass through as literal text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Datetime,
    Channel,
    Level,
    Caller,
    Message,
    Fields,
    Data,
    Extra,
}

impl Placeholder {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Datetime => "datetime",
            Self::Channel => "channel",
            Self::Level => "level",
            Self::Caller => "caller",
            Self::Message => "message",
            Self::Fields => "fields",
            Self::Data => "data",
            Self::Extra => "extra",
        }
    }

    pub const ALL: &'static [Self] = &[
        Self::Datetime,
        Self::Channel,
        Self::Level,
        Self::Caller,
        Self::Message,
        Self::Fields,
        Self::Data,
        Self::Extra,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatSegment {
    /// Whitespace, separators, and unknown `{names}`.
    Literal(String),
    /// Substituted from the record at render time.
    Placeholder(Placeholder),
}

/// Parse once, render many.
#[derive(Debug, Clone)]
pub struct FormatTemplate {
    segments: Vec<FormatSegment>,
}

impl FormatTemplate {
    #[must_use]
    pub fn parse(template: &str) -> Self {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}').map(|c| open + c) else {
                break;
            };
            current.push_str(&rest[..open]);
            let name = &rest[open + 1..close];

            if let Some(ph) = Self::match_placeholder(name) {
                if !current.is_empty() {
                    segments.push(FormatSegment::Literal(std::mem::take(&mut current)));
                }
                segments.push(FormatSegment::Placeholder(ph));
            } else {
                current.push_str(&rest[open..=close]);
            }
            rest = &rest[close + 1..];
        }

        current.push_str(rest);
        if !current.is_empty() {
            segments.push(FormatSegment::Literal(current));
        }

        Self { segments }
    }

    fn match_placeholder(name: &str) -> Option<Placeholder> {
        Placeholder::ALL.iter().copied().find(|ph| ph.as_str() == name)
    }

    #[must_use]
    pub fn segments(&self) -> &[FormatSegment] {
        &self.segments
    }

    /// Appends the rendered record to `out`.
    ///
    /// # Errors
    /// `time_format` is not a valid strftime string.
    pub fn render_into(&self, record: &Record, time_format: &str, out: &mut String) -> Result<(), Error> {
        for segment in &self.segments {
            match segment {
                FormatSegment::Literal(s) => out.push_str(s),
                FormatSegment::Placeholder(ph) => match ph {
                    Placeholder::Datetime => write_time(out, &record.time, time_format)?,
                    Placeholder::Channel => out.push_str(&record.channel),
                    Placeholder::Level => out.push_str(record.level.name()),
                    Placeholder::Caller => {
                        if let Some(caller) = &record.caller {
                            let _ = write!(out, "{caller}");
                        }
                    }
                    Placeholder::Message => out.push_str(&record.message),
                    Placeholder::Fields => push_map(out, &record.fields),
                    Placeholder::Data => push_map(out, &record.data),
                    Placeholder::Extra => push_map(out, &record.extra),
                },
            }
        }
        Ok(())
    }

    /// # Errors
    /// `time_format` is not a valid strftime string.
    pub fn render(&self, record: &Record, time_format: &str) -> Result<String, Error> {
        let mut out = String::new();
        self.render_into(record, time_format, &mut out)?;
        Ok(out)
    }
}

/// chrono reports a bad specifier only when the time is displayed.
pub(crate) fn write_time(out: &mut String, time: &DateTime<Local>, pattern: &str) -> Result<(), Error> {
    let start = out.len();
    write!(out, "{}", time.format(pattern)).map_err(|_| {
        out.truncate(start);
        Error::Format(format!("invalid time format {pattern:?}"))
    })
}

fn push_map(out: &mut String, map: &Fields) {
    if map.is_empty() {
        out.push_str("{}");
        return;
    }
    // Map<String, Value> always serializes; the fallback keeps the line intact regardless.
    match serde_json::to_string(map) {
        Ok(s) => out.push_str(&s),
        Err(_) => out.push_str("{}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;

    #[test]
    fn unknown_placeholders_stay_literal() {
        let t = FormatTemplate::parse("{level} {nope} {message");
        assert_eq!(
            t.segments(),
            &[
                FormatSegment::Placeholder(Placeholder::Level),
                FormatSegment::Literal(" {nope} {message".to_string()),
            ]
        );
    }

    #[test]
    fn renders_record_values() {
        let mut record = Record::new(Level::Warn, "disk low");
        record.channel.push_str("app");
        record.add_field("free", 12);
        let t = FormatTemplate::parse("[{channel}] {level}: {message} {fields} {extra}");
        assert_eq!(
            t.render(&record, "%Y").unwrap(),
            r#"[app] WARNING: disk low {"free":12} {}"#
        );
    }

    #[test]
    fn bad_time_format_is_an_error() {
        let record = Record::new(Level::Info, "x");
        let t = FormatTemplate::parse("{datetime} {message}");
        assert!(matches!(t.render(&record, "%Y %Q"), Err(Error::Format(_))));
        assert_eq!(t.render(&record, "%Y").unwrap().len(), "2024 x".len());
    }
}
