//! Room identifier handling
//!
//! Rooms are identified by an opaque string chosen by the creating client
//! (shared out-of-band as an invite link). The server only generates ids
//! itself for rematch rooms, where no client picked one.

use serde::{Deserialize, Serialize};

use crate::constants::room_id::GENERATED_LENGTH;

/// Alphabet used for server-generated room ids
const GENERATED_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// An opaque identifier for a game room
///
/// The id carries no structure; uniqueness is enforced by the registry at
/// creation time rather than by the id format.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Wraps a client-supplied identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random identifier for a server-created room
    ///
    /// Used for rematch rooms; lowercase alphanumeric to stay easy to share.
    pub fn random() -> Self {
        let id = (0..GENERATED_LENGTH)
            .map(|_| GENERATED_ALPHABET[fastrand::usize(..GENERATED_ALPHABET.len())] as char)
            .collect();
        Self(id)
    }

    /// Returns the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_random_id_shape() {
        let id = RoomId::random();
        assert_eq!(id.as_str().len(), GENERATED_LENGTH);
        assert!(
            id.as_str()
                .bytes()
                .all(|b| GENERATED_ALPHABET.contains(&b))
        );
    }

    #[test]
    fn test_random_ids_vary() {
        let ids: std::collections::HashSet<_> =
            (0..50).map(|_| RoomId::random().as_str().to_owned()).collect();
        assert!(ids.len() > 1);
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = RoomId::new("abc123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc123\"");

        let parsed: RoomId = serde_json::from_str("\"abc123\"").unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_display_matches_inner() {
        assert_eq!(RoomId::new("abc123").to_string(), "abc123");
    }
}
