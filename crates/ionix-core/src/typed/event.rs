//! Event trait - event_type 文字列と payload 型の対応付け
//!
//! Implementing `Event` for a payload struct lets a handler be registered
//! with `register_typed::<E>`, keyed by `E::TYPE`, so the routing key cannot
//! be mistyped at the call site.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::EventEnvelope;

pub trait Event: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Wire value of `event_type`.
    const TYPE: &'static str;

    /// Wrap this payload in an envelope with the given version and timestamp.
    fn into_envelope(
        &self,
        version: &str,
        timestamp: &str,
    ) -> Result<EventEnvelope, serde_json::Error> {
        Ok(EventEnvelope::new(Self::TYPE, serde_json::to_value(self)?)
            .with_version(version)
            .with_timestamp(timestamp))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCreated {
    pub id: i64,
}

impl Event for AccountCreated {
    const TYPE: &'static str = "ACCOUNT_CREATED";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAdded {
    pub username: String,
}

impl Event for UserAdded {
    const TYPE: &'static str = "USER_ADDED";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDeleted {
    pub username: String,
}

impl Event for UserDeleted {
    const TYPE: &'static str = "USER_DELETED";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn into_envelope_uses_event_type_constant() {
        let env = UserAdded {
            username: "user_9".into(),
        }
        .into_envelope("1.0", "2025-02-25T12:35:56Z")
        .unwrap();

        assert_eq!(env.event_type().as_str(), "USER_ADDED");
        assert_eq!(env.payload(), &json!({"username": "user_9"}));
        assert_eq!(env.version(), "1.0");
    }
}
