//! Event data and the immutable record built from it.

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::levels::Level;

/// The mutable mapping assembled by a logger and consumed by processors and
/// renderers (spec §3). Keys are arbitrary strings; values are arbitrary
/// JSON-representable data, since a processor may attach anything from a
/// plain string to a nested exception snapshot.
pub type EventData = AHashMap<String, Value>;

/// An immutable `(logger_name, level, timestamp, event_data)` envelope
/// (spec §3 "Record"). Constructed once per log call and never mutated after
/// entering the queue; handlers receive a shared reference and defensively
/// copy the event data before running their own pipeline over it.
#[derive(Debug, Clone)]
pub struct Record {
    logger_name: String,
    level: Level,
    timestamp: DateTime<Utc>,
    event_data: EventData,
}

impl Record {
    /// Build a record from already-assembled event data, stamping the
    /// creation time. The logger-factory (out of scope for this crate, per
    /// spec §6) is responsible for filling in `event_data`'s required keys
    /// (`event`, `level`, `name`, `context`) before calling this.
    pub fn new(logger_name: impl Into<String>, level: Level, event_data: EventData) -> Self {
        Record {
            logger_name: logger_name.into(),
            level,
            timestamp: Utc::now(),
            event_data,
        }
    }

    /// Build a record with an explicit timestamp. Useful for tests and for
    /// replaying records whose original creation time must be preserved.
    pub fn with_timestamp(
        logger_name: impl Into<String>,
        level: Level,
        timestamp: DateTime<Utc>,
        event_data: EventData,
    ) -> Self {
        Record {
            logger_name: logger_name.into(),
            level,
            timestamp,
            event_data,
        }
    }

    pub fn logger_name(&self) -> &str {
        &self.logger_name
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The defensive copy every handler pipeline starts from (spec §4.E
    /// step 1: "Copy event data (defensive, to avoid cross-handler
    /// mutation)").
    pub fn event_data_copy(&self) -> EventData {
        self.event_data.clone()
    }

    pub fn event_data(&self) -> &EventData {
        &self.event_data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data() -> EventData {
        let mut data = EventData::default();
        data.insert("event".to_string(), Value::String("hello".to_string()));
        data
    }

    #[test]
    fn event_data_copy_is_independent() {
        let record = Record::new("app", Level::Info, sample_data());
        let mut copy = record.event_data_copy();
        copy.insert("event".to_string(), Value::String("mutated".to_string()));
        assert_eq!(
            record.event_data().get("event").unwrap(),
            &Value::String("hello".to_string())
        );
        assert_eq!(copy.get("event").unwrap(), &Value::String("mutated".to_string()));
    }

    #[test]
    fn accessors_reflect_construction() {
        let record = Record::new("app.sub", Level::Error, sample_data());
        assert_eq!(record.logger_name(), "app.sub");
        assert_eq!(record.level(), Level::Error);
    }
}
