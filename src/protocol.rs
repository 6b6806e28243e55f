//! Wire-compatible envelope types for the Reach chat protocol.
//!
//! Every envelope is serialized as an externally tagged JSON object with
//! exactly one top-level key naming the variant, matching the server's
//! `JsonMessage` enum byte for byte:
//!
//! ```json
//! {"Register":{"username":"…","password":"…"}}
//! {"Message":{"username":"alice","msg":"hi"}}
//! ```
//!
//! The single-key invariant is enforced on the decode path by
//! [`codec::decode`](crate::codec::decode), which also maps unknown variant
//! keys to a distinguished value instead of failing (see
//! [`Decoded::Unrecognized`](crate::codec::Decoded::Unrecognized)).

use serde::{Deserialize, Serialize};

/// Minimum chat message length in characters, inclusive.
pub const MIN_MESSAGE_CHARS: usize = 1;

/// Maximum chat message length in characters, inclusive.
///
/// The server silently drops anything longer, so the client never
/// transmits it in the first place.
pub const MAX_MESSAGE_CHARS: usize = 300;

/// Envelopes sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientEnvelope {
    /// Identity handshake (MUST be the first envelope on the wire).
    ///
    /// `username` is the per-session identifier from
    /// [`identity::new_identifier`](crate::identity::new_identifier);
    /// `password` is a fixed placeholder and carries no authentication
    /// weight.
    Register { username: String, password: String },
    /// Authenticate against an existing registration.
    Login { username: String, password: String },
    /// One-shot position report, sent at most once per session and never
    /// before a successful auth response.
    Location { lat: f64, lon: f64 },
    /// A chat message. `msg` is `1..=300` characters; out-of-range text is
    /// dropped client-side and never reaches the wire.
    SendMessage { msg: String },
}

/// Envelopes sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerEnvelope {
    /// Outcome of a `Register` handshake.
    RegisterResponse { status: bool },
    /// Outcome of a `Login` attempt.
    LoginResponse { status: bool },
    /// A chat message from a nearby peer.
    Message { username: String, msg: String },
    /// Server-computed reach (count of peers within range).
    ReachResponse { reach: u32 },
    /// Free-form server error report.
    Error { reason: String },
}
