//! Position-provider boundary for the one-shot location report.
//!
//! The core does not talk to any geolocation capability directly; it
//! consumes the outcome of a single [`PositionSource::current_position`]
//! query issued right after authentication succeeds. Permission prompts,
//! hardware access and platform APIs all live behind this trait.
//!
//! An unavailable or denied capability is expressed as `None`: the session
//! then simply proceeds without ever sending a `Location` envelope. The
//! protocol treats a missing report as a valid state, not an error.

use async_trait::async_trait;

/// A device position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

/// A one-shot source of the device position.
///
/// The client calls [`current_position`](Self::current_position) at most
/// once per session and does not cancel it once issued. Implementations
/// need not be safe to call concurrently.
#[async_trait]
pub trait PositionSource: Send + 'static {
    /// Resolve the current position, or `None` if the capability is
    /// unavailable, denied, or the query fails.
    async fn current_position(&mut self) -> Option<Position>;
}

/// A [`PositionSource`] that always returns the same position.
///
/// Useful for tests and for deployments where the position is known out of
/// band (e.g. a fixed installation).
#[derive(Debug, Clone, Copy)]
pub struct FixedPosition(pub Position);

#[async_trait]
impl PositionSource for FixedPosition {
    async fn current_position(&mut self) -> Option<Position> {
        Some(self.0)
    }
}

/// A [`PositionSource`] for clients without any position capability.
///
/// The session authenticates and chats normally but never reports a
/// location, so the server computes no reach for it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPosition;

#[async_trait]
impl PositionSource for NoPosition {
    async fn current_position(&mut self) -> Option<Position> {
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_position_resolves() {
        let mut source = FixedPosition(Position {
            lat: 52.52,
            lon: 13.405,
        });
        let pos = source.current_position().await.unwrap();
        assert_eq!(pos.lat, 52.52);
        assert_eq!(pos.lon, 13.405);
    }

    #[tokio::test]
    async fn no_position_resolves_to_none() {
        assert!(NoPosition.current_position().await.is_none());
    }
}
