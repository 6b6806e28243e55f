//! Async client for the Reach chat protocol.
//!
//! [`ReachClient`] is a thin handle that communicates with a background
//! transport loop task via an unbounded MPSC channel. Events are emitted on
//! a bounded channel ([`tokio::sync::mpsc::Receiver<ReachEvent>`]) returned
//! from [`ReachClient::start`].
//!
//! The loop drives one [`Session`](crate::session::Session): it sends the
//! `Register` handshake as soon as it starts (the transport handed to
//! `start` is already connected), forwards auth responses to the session
//! state machine, triggers the one-shot location report when
//! authentication succeeds, and renders inbound chat and reach envelopes
//! into [`ReachEvent::Line`] events.
//!
//! # Example
//!
//! ```rust,ignore
//! let transport = WebSocketTransport::connect("ws://localhost:3012").await?;
//! let (client, mut events) =
//!     ReachClient::start(transport, NoPosition, ReachConfig::new());
//!
//! client.send_chat_message("hello out there")?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         ReachEvent::Line(line) => println!("{line}"),
//!         ReachEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, warn};

use crate::codec::{self, Decoded};
use crate::error::{ReachError, Result};
use crate::event::ReachEvent;
use crate::position::PositionSource;
use crate::protocol::{ClientEnvelope, ServerEnvelope, MAX_MESSAGE_CHARS, MIN_MESSAGE_CHARS};
use crate::session::{Effect, Session};
use crate::transport::Transport;

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Fixed placeholder credential sent with every `Register` handshake.
///
/// The protocol's registration provides no real identity guarantee: every
/// client registers a throwaway username with this same password. Kept for
/// wire compatibility; do not mistake it for authentication.
pub const PLACEHOLDER_PASSWORD: &str = "password";

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`ReachClient`] session.
///
/// All fields have defaults; [`ReachConfig::new`] is enough for the common
/// case.
///
/// # Example
///
/// ```
/// use reach_client::client::ReachConfig;
/// use std::time::Duration;
///
/// let config = ReachConfig::new()
///     .with_event_channel_capacity(512)
///     .with_shutdown_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct ReachConfig {
    /// Credential sent with the `Register` handshake (and available to
    /// [`ReachClient::login`]). Defaults to [`PLACEHOLDER_PASSWORD`].
    pub password: String,
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer cannot keep up with incoming envelopes, events are
    /// dropped (with a warning logged) to avoid blocking the transport
    /// loop. The `Disconnected` event is always delivered regardless of
    /// capacity.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Timeout for the graceful shutdown.
    ///
    /// When [`ReachClient::shutdown`] is called, the background transport
    /// loop is given this much time to close the transport and emit a final
    /// `Disconnected` event. If the timeout expires the task is aborted.
    ///
    /// Defaults to **1 second**. A zero timeout aborts the transport loop
    /// immediately without waiting for graceful shutdown.
    pub shutdown_timeout: Duration,
}

impl ReachConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            password: PLACEHOLDER_PASSWORD.to_string(),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Override the handshake credential.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Set the capacity of the bounded event channel.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the timeout for the graceful shutdown.
    ///
    /// Defaults to **1 second**. A zero timeout aborts the transport loop
    /// immediately without waiting for graceful shutdown.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

impl Default for ReachConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ── Shared state ────────────────────────────────────────────────────

/// Internal shared state between the client handle and the transport loop.
struct ClientState {
    connected: AtomicBool,
    authenticated: AtomicBool,
    identifier: Mutex<Option<String>>,
}

impl ClientState {
    fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            authenticated: AtomicBool::new(false),
            identifier: Mutex::new(None),
        }
    }
}

// ── Client handle ───────────────────────────────────────────────────

/// Async client handle for the Reach chat protocol.
///
/// Created via [`ReachClient::start`], which spawns a background transport
/// loop and returns this handle together with an event receiver.
///
/// Outbound methods serialize a [`ClientEnvelope`] and queue it to the
/// transport loop over an unbounded channel; they return immediately once
/// the envelope is queued (no round-trip await). When the session has
/// ended, every outbound method returns [`ReachError::NotConnected`]
/// instead of silently succeeding.
pub struct ReachClient {
    /// Sender half of the command channel to the transport loop.
    cmd_tx: mpsc::UnboundedSender<ClientEnvelope>,
    /// Shared state updated by the transport loop.
    state: Arc<ClientState>,
    /// Handle to the background transport loop task.
    task: Option<tokio::task::JoinHandle<()>>,
    /// Oneshot sender to signal the transport loop to shut down gracefully.
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    /// Timeout for the graceful shutdown.
    shutdown_timeout: Duration,
}

impl ReachClient {
    /// Start the client transport loop and return a handle plus event
    /// receiver.
    ///
    /// The loop generates a fresh session identifier, immediately sends a
    /// [`Register`](ClientEnvelope::Register) envelope carrying it, and
    /// then dispatches traffic until the transport closes or
    /// [`shutdown`](Self::shutdown) is called. The position source is
    /// queried exactly once, after the server accepts the handshake.
    ///
    /// # Arguments
    ///
    /// * `transport` — A connected [`Transport`] implementation.
    /// * `position` — The device [`PositionSource`] for the one-shot
    ///   location report.
    /// * `config` — Client configuration.
    ///
    /// # Returns
    ///
    /// A tuple of `(client_handle, event_receiver)`. The event receiver
    /// yields [`ReachEvent`]s until the transport closes or the client
    /// shuts down.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start(
        transport: impl Transport,
        position: impl PositionSource,
        config: ReachConfig,
    ) -> (Self, mpsc::Receiver<ReachEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<ClientEnvelope>();
        // Clamp capacity to at least 1 (tokio panics on 0).
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<ReachEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let state = Arc::new(ClientState::new());
        let loop_state = Arc::clone(&state);

        // The loop keeps a sender clone until authentication so the
        // spawned location-report task can queue its Location envelope.
        let loc_tx = cmd_tx.clone();

        let task = tokio::spawn(transport_loop(
            transport,
            position,
            config.password,
            cmd_rx,
            loc_tx,
            event_tx,
            loop_state,
            shutdown_rx,
        ));

        let client = Self {
            cmd_tx,
            state,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
        };

        (client, event_rx)
    }

    // ── Public API methods ──────────────────────────────────────────

    /// Send a chat message to nearby peers.
    ///
    /// Text shorter than 1 or longer than 300 characters is dropped
    /// locally and never transmitted; the drop is silent apart from a
    /// debug log, matching the protocol's validation policy. In-range text
    /// produces exactly one `SendMessage` envelope, unmodified.
    ///
    /// # Errors
    ///
    /// Returns [`ReachError::NotConnected`] if the session has ended.
    pub fn send_chat_message(&self, text: impl Into<String>) -> Result<()> {
        let msg = text.into();
        let chars = msg.chars().count();
        if !(MIN_MESSAGE_CHARS..=MAX_MESSAGE_CHARS).contains(&chars) {
            debug!(chars, "chat message length out of range, dropping");
            return Ok(());
        }
        self.send(ClientEnvelope::SendMessage { msg })
    }

    /// Authenticate against an existing registration.
    ///
    /// The automatic `Register` handshake already runs at session start;
    /// this is for callers that hold real credentials for the server's
    /// `Login` path.
    ///
    /// # Errors
    ///
    /// Returns [`ReachError::NotConnected`] if the session has ended.
    pub fn login(&self, username: impl Into<String>, password: impl Into<String>) -> Result<()> {
        self.send(ClientEnvelope::Login {
            username: username.into(),
            password: password.into(),
        })
    }

    /// Shut down the client, closing the transport and stopping the
    /// background task.
    ///
    /// After calling this method, the event receiver will yield `None`
    /// once the transport loop exits.
    pub async fn shutdown(&mut self) {
        debug!("ReachClient: shutdown requested");

        // Signal the transport loop to shut down gracefully.
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        // Await the transport loop with a timeout. If it doesn't exit in
        // time, abort it so the task cannot detach and run indefinitely.
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("transport loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("transport loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("transport loop aborted: {join_err}");
                    }
                }
            }
        }

        self.state.connected.store(false, Ordering::Release);
    }

    // ── State accessors ─────────────────────────────────────────────

    /// Returns `true` if the transport is believed to be connected.
    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }

    /// Returns `true` if the server has accepted the handshake.
    pub fn is_authenticated(&self) -> bool {
        self.state.authenticated.load(Ordering::Acquire)
    }

    /// Returns the session identifier, once the loop has generated it.
    pub async fn identifier(&self) -> Option<String> {
        self.state.identifier.lock().await.clone()
    }

    // ── Internal helpers ────────────────────────────────────────────

    /// Queue a [`ClientEnvelope`] to the transport loop.
    fn send(&self, envelope: ClientEnvelope) -> Result<()> {
        if !self.state.connected.load(Ordering::Acquire) {
            return Err(ReachError::NotConnected);
        }
        self.cmd_tx
            .send(envelope)
            .map_err(|_| ReachError::NotConnected)
    }
}

impl std::fmt::Debug for ReachClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReachClient")
            .field("connected", &self.is_connected())
            .field("authenticated", &self.is_authenticated())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for ReachClient {
    fn drop(&mut self) {
        // `Drop` is synchronous so we cannot await a graceful shutdown.
        // The only safe action is to abort the spawned task, which causes
        // the transport loop future to be dropped immediately.  The
        // `shutdown_tx` oneshot is intentionally *not* sent here: sending
        // it would trigger a graceful path that calls async `transport.close()`,
        // but there is no executor context to drive it inside `Drop`.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Transport loop ──────────────────────────────────────────────────

/// Background transport loop that multiplexes send/receive via
/// `tokio::select!`.
///
/// Exits when:
/// - The shutdown signal fires (client called `shutdown`)
/// - The transport returns `None` (server closed connection)
/// - A transport error occurs
///
/// No reconnection is attempted: once this loop exits the session is over.
#[allow(clippy::too_many_arguments)]
async fn transport_loop(
    mut transport: impl Transport,
    position: impl PositionSource,
    password: String,
    mut cmd_rx: mpsc::UnboundedReceiver<ClientEnvelope>,
    loc_tx: mpsc::UnboundedSender<ClientEnvelope>,
    event_tx: mpsc::Sender<ReachEvent>,
    state: Arc<ClientState>,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) {
    debug!("transport loop started");

    let mut session = Session::new();
    *state.identifier.lock().await = Some(session.identifier().to_string());

    emit_event(&event_tx, ReachEvent::Connected).await;

    // onOpen: the transport handed to `start` is already connected, so the
    // handshake fires before the first select iteration.
    if let Effect::SendRegister { username } = session.on_open() {
        let register = ClientEnvelope::Register { username, password };
        if !send_envelope(&mut transport, &register).await {
            session.on_close();
            emit_disconnected(&event_tx, &state, Some("handshake send failed".into())).await;
            return;
        }
    }

    // Consumed when the location report is spawned; both are one-shot.
    let mut position = Some(position);
    let mut loc_tx = Some(loc_tx);

    loop {
        tokio::select! {
            // Branch 1: outgoing envelope queued by the client handle (or
            // the location-report task)
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(envelope) => {
                        debug!("sending envelope: {:?}", std::mem::discriminant(&envelope));
                        if !send_envelope(&mut transport, &envelope).await {
                            session.on_close();
                            emit_disconnected(
                                &event_tx,
                                &state,
                                Some("transport send error".into()),
                            ).await;
                            break;
                        }
                    }
                    // Command channel closed — every sender dropped.
                    None => {
                        debug!("command channel closed, shutting down transport loop");
                        let _ = transport.close().await;
                        session.on_close();
                        emit_disconnected(&event_tx, &state, Some("client shut down".into())).await;
                        break;
                    }
                }
            }

            // Branch 2: shutdown signal
            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                let _ = transport.close().await;
                session.on_close();
                emit_disconnected(&event_tx, &state, Some("client shut down".into())).await;
                break;
            }

            // Branch 3: incoming frame from the server
            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => {
                        match codec::decode(&text) {
                            Ok(Decoded::Envelope(envelope)) => {
                                dispatch(
                                    envelope,
                                    &mut session,
                                    &mut position,
                                    &mut loc_tx,
                                    &event_tx,
                                    &state,
                                ).await;
                            }
                            Ok(Decoded::Unrecognized { tag }) => {
                                // Forward-compatibility policy: drop silently.
                                debug!(%tag, "ignoring unrecognized envelope");
                            }
                            Err(e) => {
                                // Drop the frame, keep the connection.
                                warn!("dropping malformed frame: {e} — raw: {text}");
                            }
                        }
                    }
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        session.on_close();
                        emit_disconnected(
                            &event_tx,
                            &state,
                            Some(format!("transport receive error: {e}")),
                        ).await;
                        break;
                    }
                    // Transport closed cleanly.
                    None => {
                        debug!("transport closed by server");
                        session.on_close();
                        emit_disconnected(&event_tx, &state, None).await;
                        break;
                    }
                }
            }
        }
    }

    debug!("transport loop exited");
}

/// Encode and send one envelope. Returns `false` if the transport failed
/// and the loop must terminate.
async fn send_envelope(transport: &mut impl Transport, envelope: &ClientEnvelope) -> bool {
    match codec::encode(envelope) {
        Ok(json) => {
            if let Err(e) = transport.send(json).await {
                error!("transport send error: {e}");
                return false;
            }
            true
        }
        Err(e) => {
            error!("failed to serialize envelope: {e}");
            // Serialization errors are programming bugs; don't kill the loop.
            true
        }
    }
}

/// Route one inbound envelope to its reaction.
async fn dispatch(
    envelope: ServerEnvelope,
    session: &mut Session,
    position: &mut Option<impl PositionSource>,
    loc_tx: &mut Option<mpsc::UnboundedSender<ClientEnvelope>>,
    event_tx: &mpsc::Sender<ReachEvent>,
    state: &ClientState,
) {
    match envelope {
        ServerEnvelope::RegisterResponse { status } | ServerEnvelope::LoginResponse { status } => {
            match session.on_auth_response(status) {
                Effect::ReportLocation => {
                    state.authenticated.store(true, Ordering::Release);
                    debug!("state: authenticated");
                    emit_event(event_tx, ReachEvent::Authenticated).await;
                    spawn_location_report(position.take(), loc_tx.take());
                }
                Effect::AuthRejected => {
                    debug!("authentication rejected by server");
                    emit_event(event_tx, ReachEvent::AuthenticationFailed).await;
                }
                _ => {}
            }
        }
        ServerEnvelope::Message { username, msg } => {
            emit_event(event_tx, ReachEvent::Line(format!("{username}: {msg}"))).await;
        }
        ServerEnvelope::ReachResponse { reach } => {
            emit_event(event_tx, ReachEvent::Line(format!("Reach {reach}"))).await;
        }
        ServerEnvelope::Error { reason } => {
            emit_event(event_tx, ReachEvent::ServerError { reason }).await;
        }
    }
}

/// Spawn the one-shot location report task.
///
/// Both arguments are `take()`n by the caller, so this runs at most once
/// per session. The task is not cancellable once issued; if the session
/// closes before the query resolves, the queued envelope is simply never
/// sent.
fn spawn_location_report(
    source: Option<impl PositionSource>,
    tx: Option<mpsc::UnboundedSender<ClientEnvelope>>,
) {
    let (Some(mut source), Some(tx)) = (source, tx) else {
        return;
    };
    tokio::spawn(async move {
        match source.current_position().await {
            Some(pos) => {
                debug!(lat = pos.lat, lon = pos.lon, "position resolved");
                let _ = tx.send(ClientEnvelope::Location {
                    lat: pos.lat,
                    lon: pos.lon,
                });
            }
            None => {
                // Capability unavailable or denied: proceed without a report.
                debug!("position unavailable, skipping location report");
            }
        }
    });
}

/// Emit an event to the event channel. If the channel is full, log a
/// warning and drop the event to avoid blocking the transport loop.
async fn emit_event(event_tx: &mpsc::Sender<ReachEvent>, event: ReachEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!(
                "event channel full, dropping event: {:?}",
                std::mem::discriminant(&dropped)
            );
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}

/// Emit a [`Disconnected`](ReachEvent::Disconnected) event and update state.
///
/// Uses `send().await` (blocking) instead of `try_send` because
/// `Disconnected` is always the last event on the channel and must never be
/// silently dropped.
async fn emit_disconnected(
    event_tx: &mpsc::Sender<ReachEvent>,
    state: &ClientState,
    reason: Option<String>,
) {
    state.connected.store(false, Ordering::Release);
    state.authenticated.store(false, Ordering::Release);
    let event = ReachEvent::Disconnected { reason };
    if event_tx.send(event).await.is_err() {
        debug!("event channel closed, receiver dropped");
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::position::{FixedPosition, NoPosition, Position};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    // ── Mock transport ──────────────────────────────────────────────

    /// A mock transport that records sent envelopes and replays scripted
    /// responses.
    struct MockTransport {
        /// Frames that `recv()` will yield in order.
        incoming: VecDeque<Option<std::result::Result<String, ReachError>>>,
        /// Recorded outgoing frames.
        sent: Arc<StdMutex<Vec<String>>>,
        /// Whether `close()` was called.
        closed: Arc<AtomicBool>,
    }

    impl MockTransport {
        fn new(
            incoming: Vec<Option<std::result::Result<String, ReachError>>>,
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
        async fn send(&mut self, message: String) -> std::result::Result<(), ReachError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, ReachError>> {
            if let Some(item) = self.incoming.pop_front() {
                // An explicit `None` entry signals a clean transport close;
                // `Some(result)` delivers the scripted frame or error.
                item
            } else {
                // All scripted frames have been delivered — hang forever
                // so the transport loop stays alive until shutdown.
                std::future::pending().await
            }
        }

        async fn close(&mut self) -> std::result::Result<(), ReachError> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn register_accepted_json() -> String {
        serde_json::to_string(&ServerEnvelope::RegisterResponse { status: true }).unwrap()
    }

    fn register_rejected_json() -> String {
        serde_json::to_string(&ServerEnvelope::RegisterResponse { status: false }).unwrap()
    }

    fn decode_sent(json: &str) -> ClientEnvelope {
        serde_json::from_str(json).unwrap()
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn start_sends_register_handshake_first() {
        let (transport, sent, _closed) =
            MockTransport::new(vec![Some(Ok(register_accepted_json()))]);

        let (mut client, mut events) =
            ReachClient::start(transport, NoPosition, ReachConfig::new());

        // First event should be Connected.
        let event = events.recv().await.unwrap();
        assert!(matches!(event, ReachEvent::Connected));

        // Wait for the Authenticated event.
        let event = events.recv().await.unwrap();
        assert!(matches!(event, ReachEvent::Authenticated));

        {
            let messages = sent.lock().unwrap();
            assert!(!messages.is_empty());
            let first = decode_sent(&messages[0]);
            if let ClientEnvelope::Register { username, password } = first {
                assert_eq!(username.len(), 32);
                assert_eq!(password, PLACEHOLDER_PASSWORD);
                assert_eq!(client.identifier().await.as_deref(), Some(username.as_str()));
            } else {
                panic!("expected Register handshake, got {first:?}");
            }
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn state_updates_on_accepted_auth() {
        let (transport, _sent, _closed) =
            MockTransport::new(vec![Some(Ok(register_accepted_json()))]);

        let (mut client, mut events) =
            ReachClient::start(transport, NoPosition, ReachConfig::new());

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Authenticated

        assert!(client.is_authenticated());
        assert!(client.is_connected());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn rejected_auth_emits_failure_and_stays_connected() {
        let (transport, sent, _closed) =
            MockTransport::new(vec![Some(Ok(register_rejected_json()))]);

        let (mut client, mut events) = ReachClient::start(
            transport,
            FixedPosition(Position { lat: 1.0, lon: 2.0 }),
            ReachConfig::new(),
        );

        let _ = events.recv().await; // Connected
        let event = events.recv().await.unwrap();
        assert!(matches!(event, ReachEvent::AuthenticationFailed));

        assert!(!client.is_authenticated());
        assert!(client.is_connected());

        // No Location envelope may follow a rejected handshake.
        tokio::time::sleep(Duration::from_millis(50)).await;
        {
            let messages = sent.lock().unwrap();
            assert!(messages
                .iter()
                .all(|m| !matches!(decode_sent(m), ClientEnvelope::Location { .. })));
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn location_is_reported_once_after_auth() {
        let (transport, sent, _closed) =
            MockTransport::new(vec![Some(Ok(register_accepted_json()))]);

        let (mut client, mut events) = ReachClient::start(
            transport,
            FixedPosition(Position {
                lat: 52.52,
                lon: 13.405,
            }),
            ReachConfig::new(),
        );

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Authenticated

        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            let locations: Vec<_> = messages
                .iter()
                .map(|m| decode_sent(m))
                .filter(|e| matches!(e, ClientEnvelope::Location { .. }))
                .collect();
            assert_eq!(locations.len(), 1);
            assert_eq!(
                locations[0],
                ClientEnvelope::Location {
                    lat: 52.52,
                    lon: 13.405
                }
            );
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn duplicate_auth_response_does_not_report_twice() {
        let (transport, sent, _closed) = MockTransport::new(vec![
            Some(Ok(register_accepted_json())),
            Some(Ok(register_accepted_json())),
        ]);

        let (mut client, mut events) = ReachClient::start(
            transport,
            FixedPosition(Position { lat: 0.5, lon: 0.5 }),
            ReachConfig::new(),
        );

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Authenticated

        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            let locations = messages
                .iter()
                .filter(|m| matches!(decode_sent(m), ClientEnvelope::Location { .. }))
                .count();
            assert_eq!(locations, 1);
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn unavailable_position_skips_location_report() {
        let (transport, sent, _closed) =
            MockTransport::new(vec![Some(Ok(register_accepted_json()))]);

        let (mut client, mut events) =
            ReachClient::start(transport, NoPosition, ReachConfig::new());

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Authenticated

        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            assert!(messages
                .iter()
                .all(|m| !matches!(decode_sent(m), ClientEnvelope::Location { .. })));
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn send_chat_message_queues_envelope() {
        let (transport, sent, _closed) =
            MockTransport::new(vec![Some(Ok(register_accepted_json()))]);

        let (mut client, mut events) =
            ReachClient::start(transport, NoPosition, ReachConfig::new());

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Authenticated

        client.send_chat_message("hello out there").unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            let last = decode_sent(messages.last().unwrap());
            assert_eq!(
                last,
                ClientEnvelope::SendMessage {
                    msg: "hello out there".into()
                }
            );
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn out_of_range_chat_message_is_dropped_silently() {
        let (transport, sent, _closed) =
            MockTransport::new(vec![Some(Ok(register_accepted_json()))]);

        let (mut client, mut events) =
            ReachClient::start(transport, NoPosition, ReachConfig::new());

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Authenticated

        client.send_chat_message("").unwrap();
        client.send_chat_message("x".repeat(301)).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            assert!(messages
                .iter()
                .all(|m| !matches!(decode_sent(m), ClientEnvelope::SendMessage { .. })));
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn login_sends_login_envelope() {
        let (transport, sent, _closed) =
            MockTransport::new(vec![Some(Ok(register_accepted_json()))]);

        let (mut client, mut events) =
            ReachClient::start(transport, NoPosition, ReachConfig::new());

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Authenticated

        client.login("alice", "secret").unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            let last = decode_sent(messages.last().unwrap());
            assert_eq!(
                last,
                ClientEnvelope::Login {
                    username: "alice".into(),
                    password: "secret".into()
                }
            );
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn disconnected_on_transport_close() {
        let (transport, _sent, _closed) = MockTransport::new(vec![
            Some(Ok(register_accepted_json())),
            // Explicit None signals clean transport close.
            None,
        ]);

        let (mut client, mut events) =
            ReachClient::start(transport, NoPosition, ReachConfig::new());

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Authenticated
        let event = events.recv().await.unwrap(); // Disconnected
        assert!(matches!(event, ReachEvent::Disconnected { .. }));

        assert!(!client.is_connected());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn transport_recv_error_emits_disconnected() {
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Err(
            ReachError::TransportReceive("boom".into()),
        ))]);

        let (mut client, mut events) =
            ReachClient::start(transport, NoPosition, ReachConfig::new());

        let _ = events.recv().await; // Connected
        let event = events.recv().await.unwrap();
        assert!(matches!(event, ReachEvent::Disconnected { .. }));
        if let ReachEvent::Disconnected { reason } = event {
            assert!(reason.unwrap().contains("boom"));
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn not_connected_error_after_shutdown() {
        let (transport, _sent, _closed) =
            MockTransport::new(vec![Some(Ok(register_accepted_json()))]);

        let (mut client, mut events) =
            ReachClient::start(transport, NoPosition, ReachConfig::new());

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Authenticated

        client.shutdown().await;

        let result = client.send_chat_message("too late");
        assert!(matches!(result, Err(ReachError::NotConnected)));
    }

    #[tokio::test]
    async fn malformed_frame_is_dropped_and_connection_survives() {
        let (transport, sent, _closed) = MockTransport::new(vec![
            Some(Ok("{not json".into())),
            Some(Ok(r#"{"RegisterResponse":{"status":true},"Extra":{}}"#.into())),
            Some(Ok(register_accepted_json())),
        ]);

        let (mut client, mut events) =
            ReachClient::start(transport, NoPosition, ReachConfig::new());

        let _ = events.recv().await; // Connected
        // The two malformed frames produce no events; the well-formed one
        // authenticates the session.
        let event = events.recv().await.unwrap();
        assert!(matches!(event, ReachEvent::Authenticated));
        assert!(client.is_connected());

        client.send_chat_message("still alive").unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        {
            let messages = sent.lock().unwrap();
            assert!(messages
                .iter()
                .any(|m| matches!(decode_sent(m), ClientEnvelope::SendMessage { .. })));
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn unrecognized_envelope_produces_no_event() {
        let (transport, _sent, _closed) = MockTransport::new(vec![
            Some(Ok(r#"{"SomethingNew":{"x":1}}"#.into())),
            Some(Ok(register_accepted_json())),
        ]);

        let (mut client, mut events) =
            ReachClient::start(transport, NoPosition, ReachConfig::new());

        let _ = events.recv().await; // Connected
        // The unrecognized envelope is skipped; next event is Authenticated.
        let event = events.recv().await.unwrap();
        assert!(matches!(event, ReachEvent::Authenticated));

        client.shutdown().await;
    }

    #[tokio::test]
    async fn server_error_is_surfaced() {
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Ok(
            serde_json::to_string(&ServerEnvelope::Error {
                reason: "rate limited".into(),
            })
            .unwrap(),
        ))]);

        let (mut client, mut events) =
            ReachClient::start(transport, NoPosition, ReachConfig::new());

        let _ = events.recv().await; // Connected
        let event = events.recv().await.unwrap();
        assert_eq!(
            event,
            ReachEvent::ServerError {
                reason: "rate limited".into()
            }
        );

        client.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_emits_disconnected() {
        let (transport, _sent, closed) =
            MockTransport::new(vec![Some(Ok(register_accepted_json()))]);

        let (mut client, mut events) =
            ReachClient::start(transport, NoPosition, ReachConfig::new());

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Authenticated

        client.shutdown().await;

        // After shutdown, a Disconnected event should have been emitted.
        let event = events.recv().await.unwrap();
        assert!(matches!(event, ReachEvent::Disconnected { .. }));
        if let ReachEvent::Disconnected { reason } = event {
            assert_eq!(reason.as_deref(), Some("client shut down"));
        }

        // The transport should have been closed.
        assert!(closed.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn double_shutdown_does_not_panic() {
        let (transport, _sent, _closed) =
            MockTransport::new(vec![Some(Ok(register_accepted_json()))]);

        let (mut client, mut events) =
            ReachClient::start(transport, NoPosition, ReachConfig::new());

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Authenticated

        client.shutdown().await;
        client.shutdown().await; // should not panic
    }

    #[tokio::test]
    async fn config_defaults() {
        let config = ReachConfig::new();
        assert_eq!(config.password, PLACEHOLDER_PASSWORD);
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn config_builder_methods() {
        let config = ReachConfig::new()
            .with_password("hunter2")
            .with_event_channel_capacity(512)
            .with_shutdown_timeout(Duration::from_secs(5));
        assert_eq!(config.password, "hunter2");
        assert_eq!(config.event_channel_capacity, 512);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn event_channel_capacity_is_clamped_to_one() {
        let config = ReachConfig::new().with_event_channel_capacity(0);
        assert_eq!(config.event_channel_capacity, 1);
    }

    #[tokio::test]
    async fn event_channel_backpressure_does_not_block() {
        // Script more inbound chat frames than the event channel can hold.
        let mut incoming: Vec<Option<std::result::Result<String, ReachError>>> = Vec::new();
        incoming.push(Some(Ok(register_accepted_json())));
        let chat_json = serde_json::to_string(&ServerEnvelope::Message {
            username: "bob".into(),
            msg: "spam".into(),
        })
        .unwrap();
        for _ in 0..20 {
            incoming.push(Some(Ok(chat_json.clone())));
        }
        incoming.push(None);

        let (transport, _sent, _closed) = MockTransport::new(incoming);

        let config = ReachConfig::new().with_event_channel_capacity(1);
        let (mut client, mut events) = ReachClient::start(transport, NoPosition, config);

        // Let the channel fill up and events get dropped.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut count = 0;
        while let Some(_event) = events.recv().await {
            count += 1;
        }
        // With capacity 1 at least Connected and the final Disconnected
        // arrive; the chat lines in between may be dropped.
        assert!(count >= 2, "expected at least 2 events, got {count}");
        assert!(
            count < 23,
            "expected backpressure to drop some events, but got all {count}"
        );

        client.shutdown().await;
    }

    #[tokio::test]
    async fn drop_without_explicit_shutdown() {
        let (transport, _sent, _closed) =
            MockTransport::new(vec![Some(Ok(register_accepted_json()))]);

        let (client, mut events) = ReachClient::start(transport, NoPosition, ReachConfig::new());

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Authenticated

        // Drop the client without calling shutdown.
        drop(client);

        // The transport loop should eventually exit; the event channel
        // will close. We just verify we don't hang or panic.
        while let Some(_event) = events.recv().await {}
    }

    #[tokio::test]
    async fn debug_impl_for_client() {
        let (transport, _sent, _closed) =
            MockTransport::new(vec![Some(Ok(register_accepted_json()))]);

        let (mut client, mut events) =
            ReachClient::start(transport, NoPosition, ReachConfig::new());

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Authenticated

        let debug_str = format!("{:?}", client);
        assert!(debug_str.contains("ReachClient"));
        assert!(debug_str.contains("connected"));

        client.shutdown().await;
    }
}
