//! Connection identity and message tunneling
//!
//! This module defines the ephemeral identifier for a realtime client
//! connection and the trait for pushing messages to it. The tunnel
//! abstraction keeps the room logic independent of the actual transport,
//! so every state transition can be exercised synchronously in tests.

use std::{fmt::Display, str::FromStr};

use serde_with::{DeserializeFromStr, SerializeDisplay};
use uuid::Uuid;

use super::UpdateMessage;

/// An ephemeral identifier for a single realtime connection
///
/// The connection id is the server's proxy for "player" inside a room: it
/// is minted when the connection is accepted and never outlives it.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Creates a new random connection id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    /// Creates a new random connection id (same as `new()`)
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ConnectionId {
    /// Formats the connection id as a UUID string
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ConnectionId {
    type Err = uuid::Error;

    /// Parses a connection id from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// Trait for sending messages through a communication tunnel
///
/// This trait abstracts the mechanism used to push messages to a connected
/// client. The production implementation forwards to a WebSocket; tests use
/// an in-memory recorder.
pub trait Tunnel {
    /// Sends an update message to the client
    ///
    /// Delivery is best-effort; a closed transport drops the message.
    fn send_message(&self, message: &UpdateMessage);

    /// Closes the communication tunnel
    ///
    /// Called when the connection is torn down and no further messages
    /// should be attempted.
    fn close(self);
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_connection_ids_are_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_connection_id_round_trips_through_display() {
        let id = ConnectionId::new();
        let parsed = ConnectionId::from_str(&id.to_string()).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_connection_id_serializes_as_string() {
        let id = ConnectionId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }
}
