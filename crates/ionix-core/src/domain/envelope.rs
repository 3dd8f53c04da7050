//! EventEnvelope - ルーティング用メタデータ + payload
//!
//! Wire shape:
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "event_type": "ACCOUNT_CREATED",
//!   "timestamp": "2025-02-25T12:34:56Z",
//!   "payload": { "id": 42 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Routing key of an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(String);

impl EventType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Borrow<str> for EventType {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A decoded event.
///
/// Only the codec builds envelopes from the wire, and it refuses to build one
/// without an `event_type`, so every `EventEnvelope` is routable. Fields are
/// read through accessors; an envelope is never mutated after decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    version: String,
    event_type: EventType,
    timestamp: String,
    payload: serde_json::Value,
}

impl EventEnvelope {
    pub fn new(event_type: impl Into<EventType>, payload: serde_json::Value) -> Self {
        Self {
            version: String::new(),
            event_type: event_type.into(),
            timestamp: String::new(),
            payload,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    /// Informational; not checked against a known set.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    /// ISO-8601 string as received. Not parsed.
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }
}
