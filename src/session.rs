//! Session state machine for the Reach protocol.
//!
//! A [`Session`] tracks one connection attempt from open through close and
//! gates which outbound envelopes are legal at each stage. The machine is
//! pure: transition methods return an [`Effect`] describing the side effect
//! the caller (the transport loop in [`client`](crate::client)) must
//! perform, so every transition is unit testable without a socket.
//!
//! ```text
//! Connecting ──on_open──▶ AwaitingAuth ──auth accepted──▶ Authenticated
//!      │                       │    ▲                          │
//!      │                       └────┘ auth rejected            │
//!      └────────────── transport error / close ────────────────┴──▶ Closed
//! ```

use crate::identity;

/// Authentication progress of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport not yet open; nothing may be sent.
    Connecting,
    /// `Register` handshake sent, no accepted auth response seen yet.
    AwaitingAuth,
    /// An auth response with `status: true` was observed.
    Authenticated,
    /// Terminal. Entered on transport error or close; no further sends.
    Closed,
}

/// Side effect the caller must perform after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send the `Register` handshake carrying the session identifier as
    /// the username.
    SendRegister { username: String },
    /// Trigger the one-shot location report.
    ReportLocation,
    /// Surface an authentication rejection to the UI boundary. The core
    /// performs no retry; the session stays in `AwaitingAuth`.
    AuthRejected,
    /// Nothing to do.
    None,
}

/// Client-side state for one connection attempt.
///
/// Created when the connection attempt starts, destroyed on close or error.
/// The identifier is generated exactly once, here, and reused for the
/// lifetime of the connection.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    identifier: String,
}

impl Session {
    /// Create a session in `Connecting` with a freshly generated identifier.
    pub fn new() -> Self {
        Self {
            state: SessionState::Connecting,
            identifier: identity::new_identifier(),
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The per-session identifier, also used as the chat username.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Whether an accepted auth response has been observed.
    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    /// Transport opened: `Connecting → AwaitingAuth`.
    ///
    /// Returns [`Effect::SendRegister`] exactly once; calling this in any
    /// other state is a no-op.
    pub fn on_open(&mut self) -> Effect {
        match self.state {
            SessionState::Connecting => {
                self.state = SessionState::AwaitingAuth;
                Effect::SendRegister {
                    username: self.identifier.clone(),
                }
            }
            _ => Effect::None,
        }
    }

    /// A `RegisterResponse` or `LoginResponse` arrived.
    ///
    /// An accepted response in `AwaitingAuth` moves to `Authenticated` and
    /// returns [`Effect::ReportLocation`] — the only path that ever emits
    /// it, so the location report fires at most once per session. A
    /// rejected response leaves the state unchanged. Responses in any
    /// other state (duplicates, or frames after close) are ignored.
    pub fn on_auth_response(&mut self, accepted: bool) -> Effect {
        match (self.state, accepted) {
            (SessionState::AwaitingAuth, true) => {
                self.state = SessionState::Authenticated;
                Effect::ReportLocation
            }
            (SessionState::AwaitingAuth, false) => Effect::AuthRejected,
            _ => Effect::None,
        }
    }

    /// Transport error or close: any state `→ Closed`.
    pub fn on_close(&mut self) {
        self.state = SessionState::Closed;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn open_moves_to_awaiting_auth_and_registers_with_identifier() {
        let mut session = Session::new();
        assert_eq!(session.state(), SessionState::Connecting);

        let effect = session.on_open();
        assert_eq!(session.state(), SessionState::AwaitingAuth);
        assert_eq!(
            effect,
            Effect::SendRegister {
                username: session.identifier().to_string()
            }
        );
    }

    #[test]
    fn second_open_is_a_no_op() {
        let mut session = Session::new();
        let _ = session.on_open();
        assert_eq!(session.on_open(), Effect::None);
        assert_eq!(session.state(), SessionState::AwaitingAuth);
    }

    #[test]
    fn accepted_auth_reports_location_once() {
        let mut session = Session::new();
        let _ = session.on_open();

        assert_eq!(session.on_auth_response(true), Effect::ReportLocation);
        assert!(session.is_authenticated());

        // A duplicate accepted response must not re-trigger the report.
        assert_eq!(session.on_auth_response(true), Effect::None);
    }

    #[test]
    fn rejected_auth_stays_in_awaiting_auth() {
        let mut session = Session::new();
        let _ = session.on_open();

        assert_eq!(session.on_auth_response(false), Effect::AuthRejected);
        assert_eq!(session.state(), SessionState::AwaitingAuth);

        // Rejection does not poison the session; a later accept still works.
        assert_eq!(session.on_auth_response(true), Effect::ReportLocation);
    }

    #[test]
    fn auth_response_before_open_is_ignored() {
        let mut session = Session::new();
        assert_eq!(session.on_auth_response(true), Effect::None);
        assert_eq!(session.state(), SessionState::Connecting);
    }

    #[test]
    fn close_is_terminal_from_any_state() {
        let mut session = Session::new();
        let _ = session.on_open();
        let _ = session.on_auth_response(true);

        session.on_close();
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.on_open(), Effect::None);
        assert_eq!(session.on_auth_response(true), Effect::None);
    }

    #[test]
    fn sessions_get_distinct_identifiers() {
        assert_ne!(Session::new().identifier(), Session::new().identifier());
    }
}
