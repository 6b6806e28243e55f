//! # Basic Chat Demo
//!
//! Demonstrates a complete Reach client lifecycle:
//!
//! 1. Connect to a chat server via WebSocket
//! 2. Register a throwaway identity (automatic on start)
//! 3. Report a position once the server accepts the handshake
//! 4. Send stdin lines as chat messages; print incoming lines
//! 5. Shut down gracefully on Ctrl+C or disconnect
//!
//! ## Running
//!
//! ```sh
//! # Start a Reach server on localhost:3012, then:
//! cargo run --example basic_chat
//!
//! # Override the server URL:
//! REACH_URL=ws://my-server:3012 cargo run --example basic_chat
//! ```

use tokio::io::{AsyncBufReadExt, BufReader};

use reach_client::{
    FixedPosition, Position, ReachClient, ReachConfig, ReachEvent, WebSocketTransport,
};

/// Default server URL when `REACH_URL` is not set.
const DEFAULT_URL: &str = "ws://localhost:3012";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Initialize tracing. Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let url = std::env::var("REACH_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    tracing::info!("Connecting to {url}");

    // ── Connect ─────────────────────────────────────────────────────
    let transport = WebSocketTransport::connect(&url).await?;

    // A real frontend would query the platform's geolocation capability;
    // here we report a fixed position so the server computes a reach.
    let position = FixedPosition(Position {
        lat: 52.52,
        lon: 13.405,
    });

    // Start the client. This spawns a background task that drives the
    // transport and emits events on `event_rx`. The Register handshake
    // is sent immediately with a fresh random identity.
    let (mut client, mut event_rx) =
        ReachClient::start(transport, position, ReachConfig::new());

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            // Branch 1: incoming event from the session.
            event = event_rx.recv() => {
                let Some(event) = event else {
                    tracing::info!("Event channel closed, exiting");
                    break;
                };

                match event {
                    ReachEvent::Connected => {
                        tracing::info!("Connected, handshake sent…");
                    }
                    ReachEvent::Authenticated => {
                        tracing::info!("Registered; type a message and press enter");
                    }
                    ReachEvent::AuthenticationFailed => {
                        tracing::error!("Server rejected the handshake");
                        break;
                    }
                    ReachEvent::Line(line) => {
                        println!("{line}");
                    }
                    ReachEvent::ServerError { reason } => {
                        tracing::error!("Server error: {reason}");
                    }
                    ReachEvent::Disconnected { reason } => {
                        tracing::warn!(
                            "Disconnected: {}",
                            reason.as_deref().unwrap_or("unknown")
                        );
                        break;
                    }
                }
            }

            // Branch 2: a typed line from stdin becomes a chat message.
            line = stdin.next_line() => {
                match line? {
                    Some(text) if !text.is_empty() => client.send_chat_message(text)?,
                    Some(_) => {}
                    None => break, // stdin closed
                }
            }

            // Branch 3: Ctrl+C — shut down gracefully.
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down…");
                break;
            }
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────────
    client.shutdown().await;
    tracing::info!("Client shut down. Goodbye!");
    Ok(())
}
