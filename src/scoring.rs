//! Round scoring
//!
//! This module contains the pure scoring rules for a round: a step function
//! of the seconds left on the countdown, doubled on the final round of a
//! match. Only correct answers are scored; incorrect and missing answers
//! earn nothing and never reach these functions.

use crate::constants::{round::TIME_LIMIT_SECONDS, scoring};

/// Computes the points earned for a correct answer
///
/// Answers with at least [`scoring::FULL_SPEED_THRESHOLD`] seconds left earn
/// the full award; slower answers earn the remaining seconds plus a base, a
/// strictly increasing step function saturating at the full award. The
/// result is doubled on the final round.
///
/// `time_remaining` is reported by the client and clamped to the round
/// length, so an out-of-range value cannot exceed the per-round maximum.
pub fn round_score(time_remaining: u32, is_final_round: bool) -> u32 {
    let time_remaining = time_remaining.min(TIME_LIMIT_SECONDS);

    let base = if time_remaining >= scoring::FULL_SPEED_THRESHOLD {
        scoring::FULL_SPEED_POINTS
    } else {
        time_remaining + scoring::SLOW_ANSWER_BASE
    };

    if is_final_round {
        base * scoring::FINAL_ROUND_MULTIPLIER
    } else {
        base
    }
}

/// Computes the maximum total score attainable over a match
///
/// Every round can award the full-speed points, with the final round
/// doubled; for a ten-question match this is 220, the ceiling shown to
/// players.
pub fn maximum_total(total_questions: usize) -> u32 {
    let non_final = (total_questions.saturating_sub(1)) as u32;
    non_final * scoring::FULL_SPEED_POINTS
        + scoring::FULL_SPEED_POINTS * scoring::FINAL_ROUND_MULTIPLIER
}
