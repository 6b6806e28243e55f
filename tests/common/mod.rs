#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for Reach client integration tests.
//!
//! Provides a scripted [`MockTransport`], a recording [`PositionSource`],
//! and helper functions for constructing server envelope JSON.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use reach_client::protocol::{ClientEnvelope, ServerEnvelope};
use reach_client::{Position, PositionSource, ReachError, Transport};

// ── MockTransport ───────────────────────────────────────────────────

/// A channel-based mock transport for integration testing.
///
/// Scripted server responses are consumed in order by `recv()`.
/// All frames sent by the client are recorded in `sent`.
pub struct MockTransport {
    /// Scripted server responses (consumed in order by `recv`).
    incoming: VecDeque<Option<Result<String, ReachError>>>,
    /// Recorded outgoing frames from the client.
    pub sent: Arc<StdMutex<Vec<String>>>,
    /// Whether `close()` has been called.
    pub closed: Arc<AtomicBool>,
}

impl MockTransport {
    /// Create a new mock transport with the given scripted incoming frames.
    ///
    /// Returns the transport plus shared handles for inspecting sent frames
    /// and whether close was called.
    pub fn new(
        incoming: Vec<Option<Result<String, ReachError>>>,
    ) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let transport = Self {
            incoming: VecDeque::from(incoming),
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        };
        (transport, sent, closed)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), ReachError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, ReachError>> {
        if let Some(item) = self.incoming.pop_front() {
            item
        } else {
            // No more scripted frames — hang forever so the transport loop
            // stays alive until shutdown is called.
            std::future::pending().await
        }
    }

    async fn close(&mut self) -> Result<(), ReachError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

// ── TrackingPosition ────────────────────────────────────────────────

/// A [`PositionSource`] that records how many times it was queried.
pub struct TrackingPosition {
    position: Option<Position>,
    pub queries: Arc<StdMutex<usize>>,
}

impl TrackingPosition {
    pub fn new(position: Option<Position>) -> (Self, Arc<StdMutex<usize>>) {
        let queries = Arc::new(StdMutex::new(0));
        let source = Self {
            position,
            queries: Arc::clone(&queries),
        };
        (source, queries)
    }
}

#[async_trait]
impl PositionSource for TrackingPosition {
    async fn current_position(&mut self) -> Option<Position> {
        *self.queries.lock().unwrap() += 1;
        self.position
    }
}

// ── JSON helper functions ───────────────────────────────────────────

/// JSON for a `RegisterResponse` with the given status.
pub fn register_response_json(status: bool) -> String {
    serde_json::to_string(&ServerEnvelope::RegisterResponse { status })
        .expect("register_response_json serialization")
}

/// JSON for a `LoginResponse` with the given status.
pub fn login_response_json(status: bool) -> String {
    serde_json::to_string(&ServerEnvelope::LoginResponse { status })
        .expect("login_response_json serialization")
}

/// JSON for a peer chat `Message`.
pub fn message_json(username: &str, msg: &str) -> String {
    serde_json::to_string(&ServerEnvelope::Message {
        username: username.into(),
        msg: msg.into(),
    })
    .expect("message_json serialization")
}

/// JSON for a `ReachResponse`.
pub fn reach_response_json(reach: u32) -> String {
    serde_json::to_string(&ServerEnvelope::ReachResponse { reach })
        .expect("reach_response_json serialization")
}

/// Decode a recorded outbound frame back into a [`ClientEnvelope`].
pub fn decode_sent(json: &str) -> ClientEnvelope {
    serde_json::from_str(json).expect("sent frame should be a valid ClientEnvelope")
}
