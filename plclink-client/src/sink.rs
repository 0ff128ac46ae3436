//! Publishing read results to downstream consumers.

use crate::batch::ReadResponse;
use plclink_protocol::PlcValue;
use serde_json::{Map, Value};

/// A value handed to a [`Sink`].
#[derive(Debug, Clone, PartialEq)]
pub enum SinkValue {
    Single(PlcValue),
    Many(Vec<PlcValue>),
}

impl SinkValue {
    fn from_values(mut values: Vec<PlcValue>) -> Option<Self> {
        match values.len() {
            0 => None,
            1 => values.pop().map(SinkValue::Single),
            _ => Some(SinkValue::Many(values)),
        }
    }

    /// Plain JSON: a scalar for one value, an array for several.
    pub fn to_json(&self) -> Value {
        match self {
            SinkValue::Single(value) => value.to_json(),
            SinkValue::Many(values) => Value::Array(values.iter().map(PlcValue::to_json).collect()),
        }
    }
}

/// Receives named values.
pub trait Sink {
    fn accept(&mut self, name: &str, value: SinkValue);
}

impl<K: AsRef<str>> ReadResponse<K> {
    /// Emits every successful, non-empty item to `sink`, named by its token.
    ///
    /// Returns the number of values emitted.
    pub fn publish<S: Sink + ?Sized>(&self, sink: &mut S) -> usize {
        let mut published = 0;
        for (token, outcome) in self.iter() {
            match outcome {
                Ok(values) => {
                    if let Some(value) = SinkValue::from_values(values.clone()) {
                        sink.accept(token.as_ref(), value);
                        published += 1;
                    }
                }
                Err(e) => tracing::warn!("Not publishing {}: {}", token.as_ref(), e),
            }
        }
        published
    }
}

/// Collects published values into one JSON object.
#[derive(Debug, Clone, Default)]
pub struct JsonSink {
    fields: Map<String, Value>,
}

impl JsonSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl std::fmt::Display for JsonSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(&self.fields) {
            Ok(json) => f.write_str(&json),
            Err(_) => Err(std::fmt::Error),
        }
    }
}

impl Sink for JsonSink {
    fn accept(&mut self, name: &str, value: SinkValue) {
        self.fields.insert(name.to_string(), value.to_json());
    }
}
