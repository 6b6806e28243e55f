#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Protocol serialization tests for the Reach client.
//!
//! Verifies round-trip serialization of every envelope variant, the
//! single-key invariant on the decode path, tolerance of unrecognized
//! variant keys, and JSON fixtures that match real server output.

use reach_client::codec::{self, DecodeError, Decoded};
use reach_client::protocol::{ClientEnvelope, ServerEnvelope};

// ════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════

/// Serialize `val` to JSON, then deserialize back to `T` and return it.
fn round_trip<T: serde::Serialize + serde::de::DeserializeOwned>(val: &T) -> T {
    let json = serde_json::to_string(val).expect("serialize");
    serde_json::from_str(&json).expect("deserialize")
}

/// Encode an inbound envelope the way the server would and decode it.
fn decode_server(envelope: &ServerEnvelope) -> Decoded {
    let json = serde_json::to_string(envelope).expect("serialize");
    codec::decode(&json).expect("decode")
}

// ════════════════════════════════════════════════════════════════════
// ClientEnvelope round-trips (4 variants)
// ════════════════════════════════════════════════════════════════════

#[test]
fn client_register_round_trip() {
    let envelope = ClientEnvelope::Register {
        username: "4fc1a2b3d4e5f60718293a4b5c6d7e8f".into(),
        password: "password".into(),
    };
    assert_eq!(round_trip(&envelope), envelope);
}

#[test]
fn client_login_round_trip() {
    let envelope = ClientEnvelope::Login {
        username: "alice".into(),
        password: "secret".into(),
    };
    assert_eq!(round_trip(&envelope), envelope);
}

#[test]
fn client_location_round_trip() {
    let envelope = ClientEnvelope::Location {
        lat: -33.8688,
        lon: 151.2093,
    };
    assert_eq!(round_trip(&envelope), envelope);
}

#[test]
fn client_send_message_round_trip() {
    let envelope = ClientEnvelope::SendMessage {
        msg: "hello with unicode: ünïcödé 🌍".into(),
    };
    assert_eq!(round_trip(&envelope), envelope);
}

// ════════════════════════════════════════════════════════════════════
// ServerEnvelope round-trips (5 variants)
// ════════════════════════════════════════════════════════════════════

#[test]
fn server_register_response_round_trip() {
    for status in [true, false] {
        let envelope = ServerEnvelope::RegisterResponse { status };
        assert_eq!(round_trip(&envelope), envelope);
    }
}

#[test]
fn server_login_response_round_trip() {
    for status in [true, false] {
        let envelope = ServerEnvelope::LoginResponse { status };
        assert_eq!(round_trip(&envelope), envelope);
    }
}

#[test]
fn server_message_round_trip() {
    let envelope = ServerEnvelope::Message {
        username: "alice".into(),
        msg: "hi".into(),
    };
    assert_eq!(round_trip(&envelope), envelope);
}

#[test]
fn server_reach_response_round_trip() {
    let envelope = ServerEnvelope::ReachResponse { reach: 3 };
    assert_eq!(round_trip(&envelope), envelope);
}

#[test]
fn server_error_round_trip() {
    let envelope = ServerEnvelope::Error {
        reason: "something went wrong".into(),
    };
    assert_eq!(round_trip(&envelope), envelope);
}

// ════════════════════════════════════════════════════════════════════
// Codec decode path round-trips
// ════════════════════════════════════════════════════════════════════

#[test]
fn codec_decodes_every_server_variant() {
    let variants = [
        ServerEnvelope::RegisterResponse { status: true },
        ServerEnvelope::LoginResponse { status: false },
        ServerEnvelope::Message {
            username: "bob".into(),
            msg: "a".repeat(300),
        },
        ServerEnvelope::ReachResponse { reach: 0 },
        ServerEnvelope::Error {
            reason: "nope".into(),
        },
    ];
    for envelope in variants {
        assert_eq!(decode_server(&envelope), Decoded::Envelope(envelope.clone()));
    }
}

#[test]
fn codec_encode_matches_serde() {
    let envelope = ClientEnvelope::SendMessage { msg: "hi".into() };
    assert_eq!(
        codec::encode(&envelope).unwrap(),
        serde_json::to_string(&envelope).unwrap()
    );
}

// ════════════════════════════════════════════════════════════════════
// Wire fixtures (exact server JSON)
// ════════════════════════════════════════════════════════════════════

#[test]
fn register_fixture_matches_server_format() {
    let envelope = ClientEnvelope::Register {
        username: "u1".into(),
        password: "p1".into(),
    };
    assert_eq!(
        codec::encode(&envelope).unwrap(),
        r#"{"Register":{"username":"u1","password":"p1"}}"#
    );
}

#[test]
fn message_fixture_decodes() {
    let decoded = codec::decode(r#"{"Message":{"username":"alice","msg":"hi"}}"#).unwrap();
    assert_eq!(
        decoded,
        Decoded::Envelope(ServerEnvelope::Message {
            username: "alice".into(),
            msg: "hi".into(),
        })
    );
}

#[test]
fn reach_response_fixture_decodes() {
    let decoded = codec::decode(r#"{"ReachResponse":{"reach":3}}"#).unwrap();
    assert_eq!(
        decoded,
        Decoded::Envelope(ServerEnvelope::ReachResponse { reach: 3 })
    );
}

// ════════════════════════════════════════════════════════════════════
// Single-key invariant
// ════════════════════════════════════════════════════════════════════

#[test]
fn decode_rejects_zero_keys() {
    assert!(matches!(
        codec::decode("{}"),
        Err(DecodeError::Malformed(_))
    ));
}

#[test]
fn decode_rejects_multiple_keys() {
    let frame = r#"{"RegisterResponse":{"status":true},"LoginResponse":{"status":true}}"#;
    assert!(matches!(
        codec::decode(frame),
        Err(DecodeError::Malformed(_))
    ));
}

#[test]
fn decode_rejects_non_objects() {
    for frame in ["null", "true", "7", "\"Message\"", "[{\"Message\":{}}]"] {
        assert!(
            matches!(codec::decode(frame), Err(DecodeError::Malformed(_))),
            "frame {frame:?} should be malformed"
        );
    }
}

#[test]
fn decode_rejects_known_tag_with_wrong_shape() {
    let frame = r#"{"Message":{"username":"alice"}}"#;
    assert!(matches!(
        codec::decode(frame),
        Err(DecodeError::Malformed(_))
    ));
}

// ════════════════════════════════════════════════════════════════════
// Unrecognized tolerance
// ════════════════════════════════════════════════════════════════════

#[test]
fn decode_routes_unknown_tag_to_unrecognized() {
    let decoded = codec::decode(r#"{"TypingIndicator":{"username":"bob"}}"#).unwrap();
    assert_eq!(
        decoded,
        Decoded::Unrecognized {
            tag: "TypingIndicator".into()
        }
    );
}

#[test]
fn decode_unknown_tag_payload_shape_is_irrelevant() {
    // Payloads of unknown variants are never inspected.
    for frame in [
        r#"{"Whatever":null}"#,
        r#"{"Whatever":[1,2,3]}"#,
        r#"{"Whatever":{"deeply":{"nested":true}}}"#,
    ] {
        assert!(matches!(
            codec::decode(frame),
            Ok(Decoded::Unrecognized { .. })
        ));
    }
}
