//! # Reach Client
//!
//! Transport-agnostic Rust client for the Reach location-aware chat protocol.
//!
//! The protocol is simple: a client opens a persistent connection, registers
//! a throwaway identity, reports its position once, and exchanges chat
//! messages with peers the server considers "in reach". Every message is a
//! single-key JSON envelope over a text frame.
//!
//! ## Features
//!
//! - **Transport-agnostic** — implement the [`Transport`] trait for any backend
//! - **Wire-compatible** — envelopes match the server's externally tagged JSON exactly
//! - **WebSocket built-in** — default `transport-websocket` feature provides `WebSocketTransport`
//! - **Event-driven** — receive typed [`ReachEvent`]s via a channel
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use reach_client::{NoPosition, ReachClient, ReachConfig, ReachEvent, WebSocketTransport};
//!
//! let transport = WebSocketTransport::connect("ws://localhost:3012").await?;
//! let (client, mut events) = ReachClient::start(transport, NoPosition, ReachConfig::new());
//!
//! client.send_chat_message("anyone around?")?;
//!
//! while let Some(event) = events.recv().await {
//!     if let ReachEvent::Line(line) = event {
//!         println!("{line}");
//!     }
//! }
//! ```

pub mod client;
pub mod codec;
pub mod error;
pub mod event;
pub mod identity;
pub mod position;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use client::{ReachClient, ReachConfig, PLACEHOLDER_PASSWORD};
pub use codec::{Decoded, DecodeError};
pub use error::ReachError;
pub use event::ReachEvent;
pub use position::{FixedPosition, NoPosition, Position, PositionSource};
pub use protocol::{ClientEnvelope, ServerEnvelope};
pub use session::{Session, SessionState};
pub use transport::Transport;

#[cfg(feature = "transport-websocket")]
pub use transports::WebSocketTransport;
