//! Envelope codec: the boundary between transport text frames and typed
//! protocol values.
//!
//! The decode path deliberately goes through [`serde_json::Value`] first so
//! the single-key invariant can be checked and unknown variant keys can be
//! routed to [`Decoded::Unrecognized`] instead of a hard error. A server
//! that grows new envelope kinds therefore never breaks an older client;
//! the dispatcher drops unrecognized envelopes silently.

use serde_json::Value;
use thiserror::Error;

use crate::protocol::{ClientEnvelope, ServerEnvelope};

/// Variant keys [`decode`] recognizes. Anything else is forward-compatible
/// surface and decodes to [`Decoded::Unrecognized`].
const KNOWN_TAGS: &[&str] = &[
    "RegisterResponse",
    "LoginResponse",
    "Message",
    "ReachResponse",
    "Error",
];

/// Error produced by [`decode`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The frame was not a single-key JSON object whose payload matches a
    /// known variant shape.
    #[error("malformed envelope: {0}")]
    Malformed(String),
}

/// Outcome of decoding one inbound text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// A well-formed envelope of a known variant.
    Envelope(ServerEnvelope),
    /// A single-key object with an unknown variant key. Carried for
    /// logging; the dispatcher ignores it.
    Unrecognized { tag: String },
}

/// Serialize an outbound envelope to its wire form.
///
/// # Errors
///
/// Returns [`serde_json::Error`] if serialization fails; with these types
/// that indicates a bug rather than a runtime condition.
pub fn encode(envelope: &ClientEnvelope) -> Result<String, serde_json::Error> {
    serde_json::to_string(envelope)
}

/// Decode one inbound text frame.
///
/// # Errors
///
/// Returns [`DecodeError::Malformed`] when the frame is not valid JSON, is
/// not an object, does not carry exactly one top-level key, or carries a
/// known variant key with a payload of the wrong shape.
pub fn decode(text: &str) -> Result<Decoded, DecodeError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let map = value
        .as_object()
        .ok_or_else(|| DecodeError::Malformed("frame is not a JSON object".into()))?;

    if map.len() != 1 {
        return Err(DecodeError::Malformed(format!(
            "expected exactly one variant key, found {}",
            map.len()
        )));
    }

    // `len() == 1` guarantees the iterator yields a key.
    let tag = match map.keys().next() {
        Some(tag) => tag.clone(),
        None => return Err(DecodeError::Malformed("empty envelope".into())),
    };

    if !KNOWN_TAGS.contains(&tag.as_str()) {
        return Ok(Decoded::Unrecognized { tag });
    }

    serde_json::from_value::<ServerEnvelope>(value)
        .map(Decoded::Envelope)
        .map_err(|e| DecodeError::Malformed(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn decode_known_variant() {
        let decoded = decode(r#"{"RegisterResponse":{"status":true}}"#).unwrap();
        assert_eq!(
            decoded,
            Decoded::Envelope(ServerEnvelope::RegisterResponse { status: true })
        );
    }

    #[test]
    fn decode_rejects_non_object() {
        assert!(matches!(decode("[1,2,3]"), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode("42"), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode("\"hi\""), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn decode_rejects_invalid_json() {
        assert!(matches!(decode("{nope"), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn decode_rejects_zero_keys() {
        assert!(matches!(decode("{}"), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn decode_rejects_two_keys() {
        let frame = r#"{"LoginResponse":{"status":true},"ReachResponse":{"reach":1}}"#;
        assert!(matches!(decode(frame), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn decode_rejects_known_tag_with_wrong_payload() {
        let frame = r#"{"ReachResponse":{"reach":"not a number"}}"#;
        assert!(matches!(decode(frame), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn decode_unknown_tag_is_unrecognized() {
        let decoded = decode(r#"{"FutureThing":{"x":1}}"#).unwrap();
        assert_eq!(
            decoded,
            Decoded::Unrecognized {
                tag: "FutureThing".into()
            }
        );
    }

    #[test]
    fn encode_produces_single_key_object() {
        let json = encode(&ClientEnvelope::SendMessage { msg: "hi".into() }).unwrap();
        assert_eq!(json, r#"{"SendMessage":{"msg":"hi"}}"#);
    }
}
