//! Room registry
//!
//! This module owns the process-wide mapping from room identifier to room.
//! It is a plain service object injected into the gateway rather than a
//! module-level singleton, so its lifecycle is explicit and tests can spin
//! up as many registries as they like. All mutation happens through the
//! registry, one event at a time; rooms never reference each other.

use std::{collections::HashMap, time::Duration};

use itertools::Itertools;
use serde::Serialize;
use thiserror::Error;

use crate::{
    catalog::Catalog,
    constants::room::IDLE_EXPIRY_SECONDS,
    room::{AdvanceOutcome, AlarmMessage, Room},
    room_id::RoomId,
    session::{ConnectionId, Tunnel},
};

/// Errors that can occur when addressing rooms
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// No room exists under the given identifier
    #[error("room not found")]
    NotFound,
    /// A room already exists under the given identifier
    #[error("room id already in use")]
    AlreadyExists,
}

/// Update messages originating from the registry itself
#[derive(Debug, Serialize, Clone)]
pub enum UpdateMessage {
    /// A room was allocated; sent only to the creator
    GameCreated {
        /// The identifier the room was created under
        room_id: RoomId,
    },
    /// The room sat idle past its expiry window and is being reclaimed
    RoomExpired,
}

/// The process-wide store of active rooms
///
/// Holds every live [`Room`] and performs the cross-room operations:
/// creation with collision checking, disconnect fan-out, rematch room
/// swaps, and the idle-expiry sweep.
pub struct Registry {
    /// All live rooms by identifier
    rooms: HashMap<RoomId, Room>,
    /// The catalog new rooms draw their questions from
    catalog: &'static Catalog,
    /// Age past which an idle room is reclaimed by the sweep
    idle_expiry: Duration,
}

impl Registry {
    /// Creates an empty registry over the given catalog
    pub fn new(catalog: &'static Catalog) -> Self {
        Self::with_idle_expiry(catalog, Duration::from_secs(IDLE_EXPIRY_SECONDS))
    }

    /// Creates an empty registry with a custom idle-expiry window
    pub fn with_idle_expiry(catalog: &'static Catalog, idle_expiry: Duration) -> Self {
        Self {
            rooms: HashMap::new(),
            catalog,
            idle_expiry,
        }
    }

    /// Returns the number of live rooms
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Checks whether the registry holds no rooms
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Allocates a new waiting room under a client-chosen identifier
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] if the identifier is already taken;
    /// the existing room is left untouched.
    pub fn create(&mut self, room_id: RoomId, total_questions: usize) -> Result<(), Error> {
        if self.rooms.contains_key(&room_id) {
            return Err(Error::AlreadyExists);
        }

        tracing::info!(room = %room_id, total_questions, "room created");
        self.rooms.insert(
            room_id.clone(),
            Room::new(room_id, total_questions, self.catalog),
        );
        Ok(())
    }

    /// Looks up a room for mutation
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for unknown, expired, or reclaimed ids.
    pub fn get_mut(&mut self, room_id: &RoomId) -> Result<&mut Room, Error> {
        self.rooms.get_mut(room_id).ok_or(Error::NotFound)
    }

    /// Removes a room, returning it if it existed
    pub fn remove(&mut self, room_id: &RoomId) -> Option<Room> {
        self.rooms.remove(room_id)
    }

    /// Handles a dropped connection across every room it belongs to
    ///
    /// Each affected room marks the player disconnected; rooms left with
    /// fewer than two connected players are reclaimed. Returns the
    /// identifiers of the reclaimed rooms.
    pub fn disconnect<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &mut self,
        connection_id: ConnectionId,
        tunnel_finder: F,
    ) -> Vec<RoomId> {
        let member_of = self
            .rooms
            .iter()
            .filter(|(_, room)| room.contains(connection_id))
            .map(|(id, _)| id.clone())
            .collect_vec();

        let mut reclaimed = Vec::new();
        for room_id in member_of {
            if let Some(room) = self.rooms.get_mut(&room_id) {
                if room.mark_disconnected(connection_id, &tunnel_finder) {
                    self.rooms.remove(&room_id);
                    tracing::info!(room = %room_id, %connection_id, "room reclaimed after disconnect");
                    reclaimed.push(room_id);
                }
            }
        }
        reclaimed
    }

    /// Routes a scheduled alarm to its room
    ///
    /// Alarms for rooms that no longer exist, or that have moved past the
    /// round the alarm was scheduled for, are dropped.
    pub fn receive_alarm<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &mut self,
        message: &AlarmMessage,
        tunnel_finder: F,
    ) {
        let AlarmMessage::AdvanceRound { room_id, .. } = message;
        let Ok(room) = self.get_mut(room_id) else {
            tracing::debug!(room = %room_id, "alarm for a reclaimed room dropped");
            return;
        };
        if room.receive_alarm(message, tunnel_finder) == AdvanceOutcome::Stale {
            tracing::debug!(room = %room_id, "stale advance alarm dropped");
        }
    }

    /// Accepts a rematch on a finished room
    ///
    /// Builds a replacement room under a fresh identifier with both
    /// connected players carried over (scores reset, round one drawn),
    /// announces it to both, and discards the old room.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when the old room does not exist or the
    /// accepting connection is not one of its players.
    pub fn accept_rematch<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &mut self,
        room_id: &RoomId,
        connection_id: ConnectionId,
        tunnel_finder: F,
    ) -> Result<RoomId, Error> {
        let mut new_id = RoomId::random();
        while self.rooms.contains_key(&new_id) {
            new_id = RoomId::random();
        }

        let new_room = {
            let old = self.rooms.get(room_id).ok_or(Error::NotFound)?;
            if !old.contains(connection_id) {
                return Err(Error::NotFound);
            }
            old.rematch(new_id.clone())
        };

        new_room.announce_rematch_accepted(tunnel_finder);

        self.rooms.remove(room_id);
        self.rooms.insert(new_id.clone(), new_room);
        tracing::info!(old_room = %room_id, new_room = %new_id, "rematch accepted");

        Ok(new_id)
    }

    /// Reclaims rooms that sat idle past the expiry window
    ///
    /// A room is expired once it is older than the window and either never
    /// reached two players or has already run past its question count.
    /// Members are told via `RoomExpired` before the room disappears.
    /// Returns the identifiers of the reclaimed rooms.
    pub fn sweep_expired<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &mut self,
        tunnel_finder: F,
    ) -> Vec<RoomId> {
        let expired = self
            .rooms
            .iter()
            .filter(|(_, room)| {
                room.age() >= self.idle_expiry && (!room.started() || room.is_finished())
            })
            .map(|(id, _)| id.clone())
            .collect_vec();

        for room_id in &expired {
            if let Some(room) = self.rooms.remove(room_id) {
                room.announce(&UpdateMessage::RoomExpired.into(), &tunnel_finder);
                tracing::info!(room = %room_id, "idle room expired");
            }
        }
        expired
    }
}
