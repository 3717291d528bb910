//! Room state machine
//!
//! This module contains the per-room game logic: admitting exactly two
//! players, running rounds in lockstep, scoring answers, resolving rounds
//! once everyone has answered, and handling disconnects and rematches.
//! All transitions are synchronous; timed work is expressed through a
//! `schedule_message` closure so the transport layer decides how delays
//! actually run.

use std::{
    collections::HashSet,
    time::{Duration, Instant},
};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use thiserror::Error;

use crate::{
    catalog::Catalog,
    constants::room::{PLAYER_CAPACITY, REVEAL_DELAY_SECONDS},
    options,
    room_id::RoomId,
    scoring,
    session::{ConnectionId, Tunnel},
};

/// A participant in a room
///
/// Insertion order is join order, which is also the "Player 1"/"Player 2"
/// labeling clients render. A disconnected player keeps their entry (and
/// score) so final standings stay complete.
#[derive(Debug, Clone, Serialize)]
pub struct Player {
    /// The connection this player answers from
    pub connection_id: ConnectionId,
    /// The player's display name
    pub display_name: String,
    /// Total points earned so far in this room
    pub score: u32,
    /// Whether the player's connection has dropped
    pub disconnected: bool,
}

/// Errors that can occur when mutating a room
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The room already holds two active players
    #[error("room already has two players")]
    Full,
}

/// Messages scheduled to fire after a delay
///
/// Alarms carry the question index they were scheduled for so a stale alarm
/// (the room has already moved on) is recognized and dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// Advance past the reveal delay into the next round
    AdvanceRound {
        /// The room the alarm belongs to
        room_id: RoomId,
        /// The question index that was being resolved when scheduled
        from_index: usize,
    },
}

/// The result of an advance trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// The room moved into the next round
    Advanced,
    /// The match ran past its question count and ended
    Finished,
    /// The trigger was stale and ignored
    Stale,
}

/// A complete view of a room's current round, sent when clients need to
/// re-render in one step (rematch acceptance).
#[derive(Debug, Clone, Serialize)]
pub struct RoomSnapshot {
    /// All players with their scores
    pub players: Vec<Player>,
    /// 1-based index of the current question
    pub question_index: usize,
    /// Total questions in the match
    pub total_questions: usize,
    /// The four displayed options
    pub options: Vec<String>,
    /// Image reference for the current question
    pub image: String,
    /// The label being asked for
    pub correct_answer: String,
}

/// Update messages broadcast to a room's connections
#[skip_serializing_none]
#[derive(Debug, Serialize, Clone)]
pub enum UpdateMessage {
    /// A player joined; sent to everyone in the room including the joiner
    GameJoined {
        /// The room that was joined
        room_id: RoomId,
        /// All players with their scores
        players: Vec<Player>,
        /// The four displayed options for the current round
        options: Vec<String>,
        /// Image reference for the current round
        image: String,
        /// Whether the match has both players and is underway
        started: bool,
    },
    /// The second player arrived and the match begins
    GameStarted {
        /// The room that started
        room_id: RoomId,
        /// All players with their scores
        players: Vec<Player>,
        /// The four displayed options for round one
        options: Vec<String>,
        /// Image reference for round one
        image: String,
    },
    /// A new round is underway
    NewRound {
        /// 1-based index of the new question
        question_index: usize,
        /// Total questions in the match
        total_questions: usize,
        /// The four displayed options
        options: Vec<String>,
        /// Image reference for the new question
        image: String,
        /// The label being asked for
        correct_answer: String,
    },
    /// A player answered correctly
    CorrectAnswer {
        /// The player who answered
        connection_id: ConnectionId,
        /// The player's new total score
        score: u32,
        /// Points earned by this answer
        points_earned: u32,
        /// The label that was correct
        correct_answer: String,
    },
    /// A player answered incorrectly (or ran out the clock)
    IncorrectAnswer {
        /// The player who answered
        connection_id: ConnectionId,
    },
    /// Every active player has answered the current round
    AllPlayersAnswered {
        /// The label that was correct
        correct_answer: String,
    },
    /// The final round has resolved
    GameFinished,
    /// The match is over
    GameOver {
        /// Final standings
        players: Vec<Player>,
        /// The winning connection, absent on a draw
        winner: Option<ConnectionId>,
    },
    /// A player's connection dropped
    PlayerLeft {
        /// All players, with the leaver marked disconnected
        players: Vec<Player>,
        /// The connection that dropped
        disconnected_connection_id: ConnectionId,
    },
    /// The opponent asked for a rematch
    RematchRequested,
    /// A rematch was accepted and a fresh room is ready
    RematchAccepted {
        /// Identifier of the replacement room
        new_room_id: RoomId,
        /// Complete state of the replacement room's first round
        state: RoomSnapshot,
    },
}

/// One multiplayer match instance
///
/// A room is owned by the registry and mutated only through the methods
/// here, one event at a time. Rooms are fully independent of each other.
pub struct Room {
    /// The room's identifier
    id: RoomId,
    /// Players in join order, at most two
    players: Vec<Player>,
    /// The label the current round asks for
    current_answer: String,
    /// The four displayed options for the current round
    current_options: Vec<String>,
    /// 1-based question index; `total_questions + 1` marks a finished match
    current_question_index: usize,
    /// Number of questions in the match, fixed at creation
    total_questions: usize,
    /// Connections that have answered the current round
    answered: HashSet<ConnectionId>,
    /// Set while a scheduled advance is in flight; blocks duplicate triggers
    advancing: bool,
    /// Becomes true once the second player joins (or on rematch)
    started: bool,
    /// Creation time, used for idle expiry
    created_at: Instant,
    /// The catalog questions are drawn from
    catalog: &'static Catalog,
}

impl std::fmt::Debug for Room {
    /// Debug implementation that avoids dumping the option lists
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("players", &self.players.len())
            .field("question", &self.current_question_index)
            .finish_non_exhaustive()
    }
}

impl Room {
    /// Creates a room in the waiting state with its first round drawn
    ///
    /// The first question is prepared immediately so the join broadcast
    /// already carries options and image.
    pub fn new(id: RoomId, total_questions: usize, catalog: &'static Catalog) -> Self {
        let current_answer = catalog.random_label().to_owned();
        let current_options = options::build(&current_answer, catalog.labels());
        Self {
            id,
            players: Vec::with_capacity(PLAYER_CAPACITY),
            current_answer,
            current_options,
            current_question_index: 1,
            total_questions,
            answered: HashSet::new(),
            advancing: false,
            started: false,
            created_at: Instant::now(),
            catalog,
        }
    }

    /// Returns the room's identifier
    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Returns all players in join order
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Returns whether the match has started
    pub fn started(&self) -> bool {
        self.started
    }

    /// Returns whether the match has run past its final question
    pub fn is_finished(&self) -> bool {
        self.current_question_index > self.total_questions
    }

    /// Returns how long ago the room was created
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Checks whether a connection belongs to this room
    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.players
            .iter()
            .any(|p| p.connection_id == connection_id)
    }

    /// Counts players whose connections are still up
    fn active_player_count(&self) -> usize {
        self.players.iter().filter(|p| !p.disconnected).count()
    }

    /// Returns whether the current question is the last one
    fn is_final_round(&self) -> bool {
        self.current_question_index == self.total_questions
    }

    /// Builds the image reference for the current question
    fn image_reference(&self) -> String {
        // current_answer is always drawn from the catalog
        self.catalog
            .identifier_for(&self.current_answer)
            .map(Catalog::image_reference)
            .unwrap_or_default()
    }

    /// Builds a complete snapshot of the current round
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            players: self.players.clone(),
            question_index: self.current_question_index,
            total_questions: self.total_questions,
            options: self.current_options.clone(),
            image: self.image_reference(),
            correct_answer: self.current_answer.clone(),
        }
    }

    /// Determines the winning connection, `None` on a draw
    fn winner(&self) -> Option<ConnectionId> {
        let best = self.players.iter().map(|p| p.score).max()?;
        let mut leaders = self.players.iter().filter(|p| p.score == best);
        match (leaders.next(), leaders.next()) {
            (Some(leader), None) => Some(leader.connection_id),
            _ => None,
        }
    }

    /// Broadcasts a message to every connected player in the room
    pub(crate) fn announce<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &self,
        message: &crate::UpdateMessage,
        tunnel_finder: F,
    ) {
        for player in self.players.iter().filter(|p| !p.disconnected) {
            if let Some(tunnel) = tunnel_finder(player.connection_id) {
                tunnel.send_message(message);
            }
        }
    }

    /// Sends a message to a single connection
    fn send_to<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &self,
        connection_id: ConnectionId,
        message: &crate::UpdateMessage,
        tunnel_finder: F,
    ) {
        if let Some(tunnel) = tunnel_finder(connection_id) {
            tunnel.send_message(message);
        }
    }

    /// Admits a player into the room
    ///
    /// A re-join by a connection already in the room only updates the
    /// display name. The second distinct join starts the match: `started`
    /// flips and `GameStarted` is broadcast after the join announcement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Full`] when two active players are already present.
    pub fn join<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &mut self,
        connection_id: ConnectionId,
        display_name: String,
        tunnel_finder: F,
    ) -> Result<(), Error> {
        if let Some(player) = self
            .players
            .iter_mut()
            .find(|p| p.connection_id == connection_id)
        {
            player.display_name = display_name;
        } else {
            if self.active_player_count() >= PLAYER_CAPACITY {
                return Err(Error::Full);
            }
            self.players.push(Player {
                connection_id,
                display_name,
                score: 0,
                disconnected: false,
            });
        }

        let started_now = !self.started && self.active_player_count() == PLAYER_CAPACITY;
        if started_now {
            self.started = true;
        }

        self.announce(
            &UpdateMessage::GameJoined {
                room_id: self.id.clone(),
                players: self.players.clone(),
                options: self.current_options.clone(),
                image: self.image_reference(),
                started: self.started,
            }
            .into(),
            &tunnel_finder,
        );

        if started_now {
            self.announce(
                &UpdateMessage::GameStarted {
                    room_id: self.id.clone(),
                    players: self.players.clone(),
                    options: self.current_options.clone(),
                    image: self.image_reference(),
                }
                .into(),
                &tunnel_finder,
            );
        }

        Ok(())
    }

    /// Records a player's answer for the current round
    ///
    /// The first submission per connection per round counts; repeats are
    /// silent no-ops. A correct answer is scored from the client-reported
    /// time remaining and announced individually; an incorrect or missing
    /// answer is announced without a score change. Once every active player
    /// has answered, the round resolves: the final round ends the match
    /// immediately, any other round schedules the advance after the reveal
    /// delay.
    pub fn submit_answer<
        T: Tunnel,
        F: Fn(ConnectionId) -> Option<T>,
        S: FnMut(AlarmMessage, Duration),
    >(
        &mut self,
        connection_id: ConnectionId,
        answer: Option<&str>,
        time_remaining: u32,
        mut schedule_message: S,
        tunnel_finder: F,
    ) {
        if !self.started || self.is_finished() || !self.contains(connection_id) {
            return;
        }
        if !self.answered.insert(connection_id) {
            // duplicate or late re-submission
            return;
        }

        if answer.is_some_and(|a| a == self.current_answer) {
            let points_earned = scoring::round_score(time_remaining, self.is_final_round());
            let score = {
                let player = self
                    .players
                    .iter_mut()
                    .find(|p| p.connection_id == connection_id)
                    .expect("membership checked above");
                player.score += points_earned;
                player.score
            };
            self.announce(
                &UpdateMessage::CorrectAnswer {
                    connection_id,
                    score,
                    points_earned,
                    correct_answer: self.current_answer.clone(),
                }
                .into(),
                &tunnel_finder,
            );
        } else {
            self.announce(
                &UpdateMessage::IncorrectAnswer { connection_id }.into(),
                &tunnel_finder,
            );
        }

        if self.all_active_players_answered() {
            self.announce(
                &UpdateMessage::AllPlayersAnswered {
                    correct_answer: self.current_answer.clone(),
                }
                .into(),
                &tunnel_finder,
            );

            if self.is_final_round() {
                self.finish(&tunnel_finder);
            } else {
                self.advancing = true;
                schedule_message(
                    AlarmMessage::AdvanceRound {
                        room_id: self.id.clone(),
                        from_index: self.current_question_index,
                    },
                    Duration::from_secs(REVEAL_DELAY_SECONDS),
                );
            }
        }
    }

    /// Checks whether every connected player has answered this round
    fn all_active_players_answered(&self) -> bool {
        self.players
            .iter()
            .filter(|p| !p.disconnected)
            .all(|p| self.answered.contains(&p.connection_id))
    }

    /// Ends the match: sentinel index, finish and standings broadcasts
    fn finish<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(&mut self, tunnel_finder: F) {
        self.current_question_index = self.total_questions + 1;
        self.advancing = false;
        self.announce(&UpdateMessage::GameFinished.into(), &tunnel_finder);
        self.announce(
            &UpdateMessage::GameOver {
                players: self.players.clone(),
                winner: self.winner(),
            }
            .into(),
            &tunnel_finder,
        );
    }

    /// Handles a scheduled alarm
    ///
    /// The advance runs only if an advance is still pending and the alarm
    /// was scheduled for the round the room is still on; anything else is
    /// stale and dropped.
    pub fn receive_alarm<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &mut self,
        message: &AlarmMessage,
        tunnel_finder: F,
    ) -> AdvanceOutcome {
        let AlarmMessage::AdvanceRound { from_index, .. } = message;
        if !self.advancing || *from_index != self.current_question_index {
            return AdvanceOutcome::Stale;
        }
        self.advance_round(tunnel_finder)
    }

    /// Handles a client-driven advance request
    ///
    /// Ignored while a scheduled advance is in flight, while answers are
    /// still outstanding, and after the match has finished; the question
    /// index can only ever move forward by exactly one per resolution.
    pub fn request_advance<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &mut self,
        connection_id: ConnectionId,
        tunnel_finder: F,
    ) -> AdvanceOutcome {
        if !self.contains(connection_id)
            || !self.started
            || self.is_finished()
            || self.advancing
            || !self.all_active_players_answered()
        {
            return AdvanceOutcome::Stale;
        }
        self.advance_round(tunnel_finder)
    }

    /// Moves the room into the next round
    fn advance_round<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &mut self,
        tunnel_finder: F,
    ) -> AdvanceOutcome {
        // The guard must clear on every exit path, so drop it before doing
        // anything else.
        self.advancing = false;
        self.answered.clear();
        self.current_question_index += 1;

        if self.is_finished() {
            self.announce(
                &UpdateMessage::GameOver {
                    players: self.players.clone(),
                    winner: self.winner(),
                }
                .into(),
                &tunnel_finder,
            );
            return AdvanceOutcome::Finished;
        }

        self.current_answer = self.catalog.random_label().to_owned();
        self.current_options = options::build(&self.current_answer, self.catalog.labels());

        self.announce(
            &UpdateMessage::NewRound {
                question_index: self.current_question_index,
                total_questions: self.total_questions,
                options: self.current_options.clone(),
                image: self.image_reference(),
                correct_answer: self.current_answer.clone(),
            }
            .into(),
            &tunnel_finder,
        );

        AdvanceOutcome::Advanced
    }

    /// Marks a player's connection as dropped
    ///
    /// The player keeps their entry and score. Returns `true` when fewer
    /// than two connected players remain, meaning the match is over and the
    /// room should be reclaimed by the caller.
    pub fn mark_disconnected<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &mut self,
        connection_id: ConnectionId,
        tunnel_finder: F,
    ) -> bool {
        let Some(player) = self
            .players
            .iter_mut()
            .find(|p| p.connection_id == connection_id && !p.disconnected)
        else {
            return false;
        };
        player.disconnected = true;

        self.announce(
            &UpdateMessage::PlayerLeft {
                players: self.players.clone(),
                disconnected_connection_id: connection_id,
            }
            .into(),
            &tunnel_finder,
        );

        if self.active_player_count() < PLAYER_CAPACITY {
            self.announce(
                &UpdateMessage::GameOver {
                    players: self.players.clone(),
                    winner: self.winner(),
                }
                .into(),
                &tunnel_finder,
            );
            return true;
        }

        false
    }

    /// Forwards a rematch request to the opponent
    ///
    /// Only meaningful once the match has finished; earlier requests are
    /// dropped.
    pub fn request_rematch<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &self,
        connection_id: ConnectionId,
        tunnel_finder: F,
    ) {
        if !self.is_finished() || !self.contains(connection_id) {
            return;
        }
        if let Some(opponent) = self
            .players
            .iter()
            .find(|p| p.connection_id != connection_id && !p.disconnected)
        {
            self.send_to(
                opponent.connection_id,
                &UpdateMessage::RematchRequested.into(),
                tunnel_finder,
            );
        }
    }

    /// Announces this room as the accepted rematch replacement
    ///
    /// Sent over the new room's broadcast group, which both participants
    /// have already been moved into.
    pub(crate) fn announce_rematch_accepted<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &self,
        tunnel_finder: F,
    ) {
        self.announce(
            &UpdateMessage::RematchAccepted {
                new_room_id: self.id.clone(),
                state: self.snapshot(),
            }
            .into(),
            tunnel_finder,
        );
    }

    /// Builds the replacement room for an accepted rematch
    ///
    /// Both connected players carry over with scores reset; the new room is
    /// already started on a freshly drawn round one.
    pub fn rematch(&self, new_id: RoomId) -> Room {
        let players = self
            .players
            .iter()
            .filter(|p| !p.disconnected)
            .map(|p| Player {
                connection_id: p.connection_id,
                display_name: p.display_name.clone(),
                score: 0,
                disconnected: false,
            })
            .collect_vec();

        let mut room = Room::new(new_id, self.total_questions, self.catalog);
        room.players = players;
        room.started = true;
        room
    }
}
