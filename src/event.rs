//! Events emitted to the consumer of a [`ReachClient`](crate::client::ReachClient).
//!
//! The event channel is the UI-adapter boundary: a frontend renders
//! [`Line`](ReachEvent::Line) events into its message log and may react to
//! the lifecycle events however it likes. The core never renders anything
//! itself.

/// Events emitted by the client's background transport loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ReachEvent {
    /// The transport is open and the `Register` handshake has been sent.
    Connected,
    /// The server accepted the handshake (`RegisterResponse` or
    /// `LoginResponse` with `status: true`). The one-shot location report
    /// has been triggered.
    Authenticated,
    /// The server rejected the handshake (`status: false`). The session
    /// stays alive in its unauthenticated state; no retry is attempted.
    AuthenticationFailed,
    /// A display line for the message log: `"{username}: {msg}"` for chat
    /// messages, `"Reach {reach}"` for reach updates.
    Line(String),
    /// The server reported an error.
    ServerError { reason: String },
    /// The session ended. Terminal; always the last event on the channel.
    Disconnected { reason: Option<String> },
}
