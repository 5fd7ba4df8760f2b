//! Deterministic prediction-bonus rolls.
//!
//! The bonus stream must be reproducible across implementations, so the
//! algorithm is pinned: a `StdRng` seeded from the maze-seed hash mixed
//! with the tick (golden-ratio multiplier) and the mark index, one `f64`
//! draw in [0, 1), compared against the wall probability.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::constants::PREDICTION_WALL_PROBABILITY;

/// What a prediction hit awards the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BonusAward {
    /// One wall added to the owner's stock (probability 0.7).
    Wall,
    /// One trap charge (probability 0.3).
    TrapCharge,
}

/// Rolls the bonus for the mark at `mark_index` being hit on `tick`.
pub fn prediction_bonus(seed_hash: u64, tick: u64, mark_index: u64) -> BonusAward {
    let seed = seed_hash ^ tick.wrapping_mul(0x9E3779B97F4A7C15) ^ mark_index;
    let mut rng = StdRng::seed_from_u64(seed);
    let roll: f64 = rng.random();
    if roll < PREDICTION_WALL_PROBABILITY {
        BonusAward::Wall
    } else {
        BonusAward::TrapCharge
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_inputs_same_award() {
        for tick in [0u64, 17, 6000] {
            for mark in 0u64..3 {
                assert_eq!(
                    prediction_bonus(42, tick, mark),
                    prediction_bonus(42, tick, mark),
                );
            }
        }
    }

    #[test]
    fn test_award_varies_over_the_stream() {
        // With a 70/30 split, 200 distinct ticks must produce both kinds.
        let mut walls = 0;
        let mut traps = 0;
        for tick in 0..200 {
            match prediction_bonus(7, tick, 0) {
                BonusAward::Wall => walls += 1,
                BonusAward::TrapCharge => traps += 1,
            }
        }
        assert!(walls > 0 && traps > 0, "walls={walls} traps={traps}");
        assert!(walls > traps, "wall award should dominate at 0.7");
    }

    #[test]
    fn test_mark_index_decorrelates_same_tick() {
        // Two marks hit on the same tick roll independently.
        let rolls: Vec<_> = (0u64..32)
            .map(|mark| prediction_bonus(7, 100, mark))
            .collect();
        assert!(rolls.contains(&BonusAward::Wall));
        assert!(rolls.contains(&BonusAward::TrapCharge));
    }
}
