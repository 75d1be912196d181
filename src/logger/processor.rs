//! Steps that enrich a record before it reaches any handler.

use crate::record::{Fields, Record};
use serde_json::Value;
use ulid::Ulid;

/// Runs on every record, in registration order, before fan-out.
pub trait Processor: Send + Sync {
    fn process(&self, record: &mut Record);
}

impl<F> Processor for F
where
    F: Fn(&mut Record) + Send + Sync,
{
    fn process(&self, record: &mut Record) {
        self(record);
    }
}

/// Copies the same fields into every record, without overwriting fields the call set.
#[must_use]
pub fn add_fields(fields: Fields) -> impl Processor {
    move |record: &mut Record| {
        for (key, value) in &fields {
            record
                .fields
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }
}

/// Tags each record with a fresh ULID under `extra[key]`; sortable by creation time.
#[must_use]
pub fn add_unique_id(key: impl Into<String>) -> impl Processor {
    let key = key.into();
    move |record: &mut Record| {
        record
            .extra
            .insert(key.clone(), Value::String(Ulid::new().to_string()));
    }
}

/// Records the emitting process id under `extra["pid"]`.
#[must_use]
pub fn add_pid() -> impl Processor {
    let pid = std::process::id();
    move |record: &mut Record| {
        record.extra.insert("pid".to_string(), Value::from(pid));
    }
}
