//! The stored envelope format.
//!
//! Every value the gateway writes is wrapped as `{"data": ..., "timestamp": ...}`.
//! The timestamp is informational; nothing reads it back for decisions.

use kvbind_codec::Value;
use std::collections::BTreeMap;

const DATA_FIELD: &str = "data";
const TIMESTAMP_FIELD: &str = "timestamp";

/// A stored value plus its write time.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// The application value.
    pub data: Value,
    /// Epoch milliseconds of the write, if stamped.
    pub timestamp: Option<i64>,
}

impl Envelope {
    /// Wraps `data` without a timestamp.
    pub fn new(data: Value) -> Self {
        Self {
            data,
            timestamp: None,
        }
    }

    /// Wraps `data` stamped with `timestamp`.
    pub fn stamped(data: Value, timestamp: i64) -> Self {
        Self {
            data,
            timestamp: Some(timestamp),
        }
    }

    /// Converts the envelope to its stored map form.
    pub fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        map.insert(DATA_FIELD.to_string(), self.data.clone());
        if let Some(ts) = self.timestamp {
            map.insert(TIMESTAMP_FIELD.to_string(), Value::Integer(ts));
        }
        Value::Map(map)
    }

    /// Recognizes an envelope in `value`.
    ///
    /// A map is an envelope when it has a `data` field and no fields other
    /// than `data` and an integer `timestamp`. Anything else is a bare value.
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_map()?;
        let data = map.get(DATA_FIELD)?;
        let timestamp = match map.get(TIMESTAMP_FIELD) {
            None | Some(Value::Null) => None,
            Some(ts) => Some(ts.as_integer()?),
        };
        let extra = map
            .keys()
            .any(|k| k != DATA_FIELD && k != TIMESTAMP_FIELD);
        if extra {
            return None;
        }
        Some(Self {
            data: data.clone(),
            timestamp,
        })
    }

    /// Consumes `value`, returning the wrapped data if it is an envelope.
    pub fn unwrap_value(value: Value) -> Value {
        match Self::from_value(&value) {
            Some(envelope) => envelope.data,
            None => value,
        }
    }
}
