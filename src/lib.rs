//! # Guessdex Game Library
//!
//! This library provides the multiplayer core for the Guessdex picture
//! quiz: two players in a room see the same creature picture, race a
//! countdown to pick the right label out of four, and play a fixed number
//! of rounds in lockstep. It covers the answer catalog, option generation,
//! scoring, the per-room state machine, the room registry, and the
//! WebSocket gateway that connects clients to all of it.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_panics_doc)]
use serde::Serialize;

pub mod catalog;
pub mod constants;
pub mod gateway;
pub mod names;
pub mod options;
pub mod registry;
pub mod room;
pub mod room_id;
pub mod scoring;
pub mod session;

/// Messages pushed to clients over their realtime connections
///
/// This enum gathers the outbound message sets of the different layers so
/// a tunnel only ever carries one message type. Room messages are
/// broadcast to a room's group; registry and gateway messages are unicast
/// (except `RoomExpired`, which goes to the dying room's group).
#[derive(Debug, Serialize, Clone, derive_more::From)]
pub enum UpdateMessage {
    /// Game-flow broadcasts from a room
    Room(room::UpdateMessage),
    /// Room lifecycle notices from the registry
    Registry(registry::UpdateMessage),
    /// Connection-level responses from the gateway
    Gateway(gateway::UpdateMessage),
}

impl UpdateMessage {
    /// Converts the message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}
