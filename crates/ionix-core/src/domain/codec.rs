//! Envelope codec - bytes と EventEnvelope の相互変換
//!
//! Decoding is two-staged: the bytes are parsed into a loose wire struct, then
//! the routing key is checked. The two stages map onto the two "discard"
//! outcomes of dispatch (`DecodeError` / `Unroutable`).

use serde::Deserialize;

use super::envelope::{EventEnvelope, EventType};

/// Why a raw message could not become an [`EventEnvelope`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeFailure {
    /// Not UTF-8 JSON, not an object, or a field of the wrong type.
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Well-formed, but `event_type` is missing or empty.
    #[error("envelope has no event_type")]
    Unroutable,
}

#[derive(Deserialize)]
struct WireEnvelope {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    event_type: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    payload: serde_json::Value,
}

pub fn decode_envelope(raw: &[u8]) -> Result<EventEnvelope, DecodeFailure> {
    let wire: WireEnvelope = serde_json::from_slice(raw)?;

    let event_type = match wire.event_type {
        Some(t) if !t.is_empty() => EventType::new(t),
        _ => return Err(DecodeFailure::Unroutable),
    };

    Ok(EventEnvelope::new(event_type, wire.payload)
        .with_version(wire.version.unwrap_or_default())
        .with_timestamp(wire.timestamp.unwrap_or_default()))
}

pub fn encode_envelope(envelope: &EventEnvelope) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn decodes_full_envelope() {
        let raw = br#"{"version":"1.0","event_type":"ACCOUNT_CREATED","timestamp":"t","payload":{"id":42}}"#;
        let env = decode_envelope(raw).unwrap();

        assert_eq!(env.event_type().as_str(), "ACCOUNT_CREATED");
        assert_eq!(env.version(), "1.0");
        assert_eq!(env.timestamp(), "t");
        assert_eq!(env.payload(), &json!({"id": 42}));
    }

    #[test]
    fn missing_metadata_defaults() {
        let env = decode_envelope(br#"{"event_type":"UNKNOWN"}"#).unwrap();
        assert_eq!(env.version(), "");
        assert_eq!(env.timestamp(), "");
        assert!(env.payload().is_null());
    }

    #[test]
    fn encoded_envelope_decodes_to_the_same_value() {
        let env = EventEnvelope::new("USER_DELETED", json!({"username": "user_3"}))
            .with_version("1.0")
            .with_timestamp("2025-02-27T12:36:56Z");
        let bytes = encode_envelope(&env).unwrap();
        assert_eq!(decode_envelope(&bytes).unwrap(), env);
    }

    #[rstest]
    #[case::truncated(&br#"{"event_type":"USER_ADDED","payl"#[..])]
    #[case::garbage(&b"\xff\xfe\x00garbage"[..])]
    #[case::not_an_object(&b"42"[..])]
    #[case::event_type_not_a_string(&br#"{"event_type":5}"#[..])]
    #[case::empty(&b""[..])]
    fn malformed_input_is_rejected(#[case] raw: &[u8]) {
        assert!(matches!(
            decode_envelope(raw),
            Err(DecodeFailure::Malformed(_))
        ));
    }

    #[rstest]
    #[case::missing(&br#"{"payload":{}}"#[..])]
    #[case::empty(&br#"{"event_type":"","payload":{}}"#[..])]
    #[case::null(&br#"{"event_type":null}"#[..])]
    fn missing_event_type_is_unroutable(#[case] raw: &[u8]) {
        assert!(matches!(decode_envelope(raw), Err(DecodeFailure::Unroutable)));
    }
}
