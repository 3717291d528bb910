//! Configuration constants for the guessing game
//!
//! This module contains the limits and timing constants used throughout
//! the session server to ensure data integrity and provide consistent
//! boundaries for rooms and rounds.

/// Room configuration constants
pub mod room {
    /// Number of players a room holds once full
    pub const PLAYER_CAPACITY: usize = 2;
    /// Default number of questions in a match
    pub const DEFAULT_TOTAL_QUESTIONS: usize = 10;
    /// Minimum configurable number of questions in a match
    pub const MIN_TOTAL_QUESTIONS: usize = 1;
    /// Maximum configurable number of questions in a match
    pub const MAX_TOTAL_QUESTIONS: usize = 100;
    /// Seconds players see the revealed answer before the next round starts
    pub const REVEAL_DELAY_SECONDS: u64 = 3;
    /// Seconds after creation before an idle room is eligible for reclamation
    pub const IDLE_EXPIRY_SECONDS: u64 = 300;
}

/// Room identifier constants
pub mod room_id {
    /// Minimum length of a client-supplied room identifier
    pub const MIN_LENGTH: usize = 1;
    /// Maximum length of a client-supplied room identifier
    pub const MAX_LENGTH: usize = 64;
    /// Length of server-generated room identifiers (rematch rooms)
    pub const GENERATED_LENGTH: usize = 8;
}

/// Round configuration constants
pub mod round {
    /// Number of answer options shown each round
    pub const OPTION_COUNT: usize = 4;
    /// Length of the answer window in seconds
    pub const TIME_LIMIT_SECONDS: u32 = 10;
}

/// Scoring constants
pub mod scoring {
    /// Points for an answer submitted with the timer nearly untouched
    pub const FULL_SPEED_POINTS: u32 = 20;
    /// Threshold in remaining seconds at which the full award applies
    pub const FULL_SPEED_THRESHOLD: u32 = 9;
    /// Points added on top of the remaining seconds below the threshold
    pub const SLOW_ANSWER_BASE: u32 = 11;
    /// Multiplier applied to the final round of a match
    pub const FINAL_ROUND_MULTIPLIER: u32 = 2;
}

/// Display name constants
pub mod name {
    /// Maximum length of a player display name in characters
    pub const MAX_LENGTH: usize = 30;
}
