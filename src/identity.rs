//! Per-session client identifier generation.
//!
//! The identifier doubles as the chat username during the `Register`
//! handshake. It is random (UUID v4), generated exactly once per connection
//! attempt by [`Session::new`](crate::session::Session::new), and never
//! persisted across sessions — a fresh connection gets a fresh identity.

use uuid::Uuid;

/// Generate a new session identifier.
///
/// 122 bits of randomness rendered as 32 lowercase hex characters, so
/// collisions are negligible over any realistic session volume.
pub fn new_identifier() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_32_hex_chars() {
        let id = new_identifier();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn identifiers_are_unique() {
        let a = new_identifier();
        let b = new_identifier();
        assert_ne!(a, b);
    }
}
