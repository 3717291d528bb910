//! Answer option generation
//!
//! This module builds the four choices displayed for a round: the correct
//! label plus three distinct distractors drawn uniformly from the catalog,
//! returned in unbiased shuffled order.

use crate::constants::round::OPTION_COUNT;

/// Builds the displayed options for a round
///
/// Seeds the working set with `correct`, then draws uniformly from
/// `universe` (skipping duplicates) until four distinct labels are
/// collected, and finally applies a Fisher–Yates shuffle so every ordering
/// of the four is equally likely.
///
/// # Arguments
///
/// * `correct` - The label the round is asking for
/// * `universe` - The labels distractors are drawn from, normally the whole
///   catalog
///
/// # Returns
///
/// Exactly four distinct labels including `correct`, in random order.
///
/// # Panics
///
/// In debug builds, panics if `universe` holds fewer than four distinct
/// labels (a caller precondition; the draw loop would not terminate).
pub fn build(correct: &str, universe: &[&str]) -> Vec<String> {
    debug_assert!(
        distinct_count(universe, correct) >= OPTION_COUNT,
        "universe must hold at least {OPTION_COUNT} distinct labels"
    );

    let mut options: Vec<String> = Vec::with_capacity(OPTION_COUNT);
    options.push(correct.to_owned());

    while options.len() < OPTION_COUNT {
        let candidate = universe[fastrand::usize(..universe.len())];
        if !options.iter().any(|existing| existing == candidate) {
            options.push(candidate.to_owned());
        }
    }

    fastrand::shuffle(&mut options);
    options
}

/// Counts the distinct labels in `universe`, counting `correct` whether or
/// not it appears there.
fn distinct_count(universe: &[&str], correct: &str) -> usize {
    let mut distinct: std::collections::HashSet<&str> = universe.iter().copied().collect();
    distinct.insert(correct);
    distinct.len()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    const UNIVERSE: &[&str] = &["ash", "birch", "cedar", "dogwood", "elm", "fir"];

    #[test]
    fn test_contains_correct_label() {
        for _ in 0..100 {
            let options = build("cedar", UNIVERSE);
            assert!(options.iter().any(|o| o == "cedar"));
        }
    }

    #[test]
    fn test_exactly_four_distinct_options() {
        for _ in 0..100 {
            let options = build("ash", UNIVERSE);
            assert_eq!(options.len(), 4);
            let unique: std::collections::HashSet<_> = options.iter().collect();
            assert_eq!(unique.len(), 4);
        }
    }

    #[test]
    fn test_correct_label_outside_universe() {
        // The correct label counts toward the four even when the draw pool
        // does not contain it.
        let options = build("willow", &["ash", "birch", "cedar", "dogwood"]);
        assert!(options.iter().any(|o| o == "willow"));
        assert_eq!(options.len(), 4);
    }

    #[test]
    fn test_minimal_universe_uses_every_label() {
        let mut options = build("ash", &["ash", "birch", "cedar", "dogwood"]);
        options.sort();
        assert_eq!(options, vec!["ash", "birch", "cedar", "dogwood"]);
    }

    #[test]
    fn test_every_position_reachable() {
        // With a fair shuffle the correct answer lands in each of the four
        // slots eventually.
        let mut seen = [false; 4];
        for _ in 0..200 {
            let options = build("ash", UNIVERSE);
            let position = options.iter().position(|o| o == "ash").unwrap();
            seen[position] = true;
        }
        assert!(seen.iter().all(|hit| *hit));
    }
}
