//! The per-tick simulation step.
//!
//! Runs in a fixed order so that identical initial state plus identical
//! input always replays to identical state:
//!
//! 1. input sampling (stale intent reads as zero)
//! 2. angle update
//! 3. velocity from heading, throttle, and trap slow
//! 4. axis-separated collision advancement
//! 5. trap trigger
//! 6. prediction pickup (deterministic bonus roll)
//! 7. point pickup
//! 8. goal check

use std::f64::consts::{PI, TAU};

use gridlock_maze::Cell;
use tracing::debug;

use crate::collision::advance_with_collision;
use crate::constants::{
    DT, INPUT_STALE_TICKS, MOVE_SPEED, TRAP_DURATION_DIVISOR, TRAP_SPEED_MULTIPLIER, TURN_SPEED,
};
use crate::rng::{BonusAward, prediction_bonus};
use crate::state::{Phase, SimError, World};

/// Something the step changed beyond pure kinematics. The room layer
/// folds these into broadcasts and phase transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    TrapTriggered { cell: Cell },
    PredictionHit { cell: Cell, award: BonusAward },
    PointCollected { cell: Cell },
    GoalReached { bonus: u32 },
}

/// Result of one tick.
#[derive(Debug, Default)]
pub struct StepOutcome {
    pub events: Vec<SimEvent>,
    /// Whether the player's kinematic state changed this tick.
    pub moved: bool,
}

impl StepOutcome {
    /// Whether anything observable changed.
    pub fn changed(&self) -> bool {
        self.moved || !self.events.is_empty()
    }
}

/// Wraps an angle into (-pi, pi].
fn wrap_angle(angle: f64) -> f64 {
    let mut a = angle % TAU;
    if a > PI {
        a -= TAU;
    } else if a <= -PI {
        a += TAU;
    }
    a
}

/// Advances the world by one tick.
///
/// `explore_ends_at` is the tick the explore deadline falls on; the trap
/// slow duration is a fifth of whatever remains. Outside explore the
/// player is frozen and the step is a no-op — countdown and prep render
/// from unchanged state.
pub fn step(
    world: &mut World,
    phase: Phase,
    now: u64,
    explore_ends_at: u64,
) -> Result<StepOutcome, SimError> {
    let mut outcome = StepOutcome::default();
    if phase != Phase::Explore {
        return Ok(outcome);
    }

    // 1. Input sampling — an intent older than a second reads as zero.
    let input = world.player.input;
    let (forward, turn) = if now.saturating_sub(input.received_at) > INPUT_STALE_TICKS {
        (0.0, 0.0)
    } else {
        (input.forward, input.turn)
    };

    // 2. Angle.
    let prev_angle = world.player.angle;
    world.player.angle = wrap_angle(prev_angle + turn * TURN_SPEED * DT);

    // 3. Velocity.
    let speed = MOVE_SPEED
        * if world.player.slow_active(now) {
            TRAP_SPEED_MULTIPLIER
        } else {
            1.0
        };
    let mut vx = world.player.angle.cos() * forward * speed;
    let mut vy = world.player.angle.sin() * forward * speed;

    // 4. Axis-separated collision; a blocked axis zeroes its velocity,
    // letting the free axis slide along the wall.
    let prev_pos = world.player.position;
    let (blocked_x, blocked_y) =
        advance_with_collision(&world.maze, &mut world.player.position, vx * DT, vy * DT);
    if blocked_x {
        vx = 0.0;
    }
    if blocked_y {
        vy = 0.0;
    }
    world.player.velocity = gridlock_maze::Vector2::new(vx, vy);
    outcome.moved = world.player.position != prev_pos || world.player.angle != prev_angle;

    let cell = world.player.cell();
    if !world.maze.in_bounds(cell) {
        return Err(SimError::PlayerOutsideMaze {
            x: world.player.position.x,
            y: world.player.position.y,
        });
    }

    // 5. Trap trigger.
    for trap in world.owner.traps.iter_mut() {
        if !trap.consumed && trap.cell == cell {
            trap.consumed = true;
            let remaining = explore_ends_at.saturating_sub(now);
            world.player.slow_until = Some(now + remaining / TRAP_DURATION_DIVISOR);
            debug!(%cell, until = ?world.player.slow_until, "trap triggered");
            outcome.events.push(SimEvent::TrapTriggered { cell });
        }
    }

    // 6. Prediction pickup. The mark's index seeds the bonus roll, so two
    // marks hit on the same tick still roll independently.
    let hits: Vec<usize> = world
        .owner
        .prediction_marks
        .iter()
        .enumerate()
        .filter(|(_, m)| m.active && m.cell == cell)
        .map(|(i, _)| i)
        .collect();
    for index in hits {
        world.owner.prediction_marks[index].active = false;
        world.player.prediction_hits += 1;
        let award = prediction_bonus(world.seed_hash, now, index as u64);
        match award {
            BonusAward::Wall => world.owner.wall_stock += 1,
            BonusAward::TrapCharge => world.owner.trap_charges += 1,
        }
        debug!(%cell, ?award, "prediction mark hit");
        outcome.events.push(SimEvent::PredictionHit { cell, award });
    }

    // 7. Point pickup.
    if world.points.remove(&cell) {
        world.player.score += 1;
        outcome.events.push(SimEvent::PointCollected { cell });
    }

    // 8. Goal check — ends explore within this same tick.
    if cell == world.maze.goal_cell() {
        let bonus = world.goal_bonus();
        world.player.score += bonus;
        debug!(score = world.player.score, bonus, "goal reached");
        outcome.events.push(SimEvent::GoalReached { bonus });
    }

    Ok(outcome)
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{InputState, PredictionMark, Trap};
    use gridlock_maze::{MazeState, Vector2};

    const EXPLORE_END: u64 = 6000;

    fn world() -> World {
        let mut maze = MazeState::open_grid(20, "step-test");
        // Park the player mid-grid so border walls stay out of the way.
        maze.start = Vector2::new(5.5, 5.5);
        World::new(maze)
    }

    fn hold_input(world: &mut World, forward: f64, turn: f64, now: u64) {
        world.player.input = InputState {
            forward,
            turn,
            seq: world.player.input.seq + 1,
            received_at: now,
        };
    }

    #[test]
    fn test_step_outside_explore_is_a_no_op() {
        let mut w = world();
        hold_input(&mut w, 1.0, 0.5, 0);
        let before = w.clone();

        for phase in [Phase::Lobby, Phase::Countdown, Phase::Prep, Phase::Result] {
            let outcome = step(&mut w, phase, 1, EXPLORE_END).unwrap();
            assert!(!outcome.changed());
        }
        assert_eq!(w, before);
    }

    #[test]
    fn test_forward_input_moves_along_heading() {
        let mut w = world();
        hold_input(&mut w, 1.0, 0.0, 0);

        let outcome = step(&mut w, Phase::Explore, 1, EXPLORE_END).unwrap();

        assert!(outcome.moved);
        // Heading 0 = +x, speed 2 cells/s, dt 0.05 → 0.1 cells.
        assert!((w.player.position.x - 5.6).abs() < 1e-9);
        assert!((w.player.position.y - 5.5).abs() < 1e-9);
        assert!((w.player.velocity.x - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_turn_input_rotates_at_full_turn_per_second() {
        let mut w = world();
        hold_input(&mut w, 0.0, 1.0, 0);

        step(&mut w, Phase::Explore, 1, EXPLORE_END).unwrap();

        // TAU rad/s * 0.05 s.
        assert!((w.player.angle - TAU * 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_angle_wraps_into_half_open_pi_range() {
        let mut w = world();
        w.player.angle = PI - 0.01;
        hold_input(&mut w, 0.0, 1.0, 0);

        step(&mut w, Phase::Explore, 1, EXPLORE_END).unwrap();

        assert!(w.player.angle <= PI && w.player.angle > -PI);
        assert!(w.player.angle < 0.0, "must have wrapped to the negative side");
    }

    #[test]
    fn test_stale_input_reads_as_zero() {
        let mut w = world();
        hold_input(&mut w, 1.0, 0.0, 0);
        let start = w.player.position;

        // 21 ticks later the intent is older than a second.
        let outcome = step(&mut w, Phase::Explore, 21, EXPLORE_END).unwrap();

        assert_eq!(w.player.position, start);
        assert!(!outcome.moved);
    }

    #[test]
    fn test_identical_input_stream_replays_identically() {
        let mut a = world();
        let mut b = world();

        for now in 1..=100u64 {
            if now % 7 == 0 {
                hold_input(&mut a, 1.0, -0.3, now);
                hold_input(&mut b, 1.0, -0.3, now);
            }
            step(&mut a, Phase::Explore, now, EXPLORE_END).unwrap();
            step(&mut b, Phase::Explore, now, EXPLORE_END).unwrap();
        }

        assert_eq!(a, b);
    }

    #[test]
    fn test_trap_slows_movement_and_consumes() {
        let mut w = world();
        w.owner.traps.push(Trap {
            cell: Cell::new(5, 5),
            placed_at_tick: 0,
            consumed: false,
        });
        hold_input(&mut w, 1.0, 0.0, 0);

        // Player starts inside the trap cell; first explore tick triggers.
        let now = 1000u64;
        let outcome = step(&mut w, Phase::Explore, now, EXPLORE_END).unwrap();

        assert!(matches!(outcome.events[0], SimEvent::TrapTriggered { .. }));
        assert!(w.owner.traps[0].consumed);
        // remaining 5000 ticks / 5 = 1000 ticks of slow.
        assert_eq!(w.player.slow_until, Some(2000));

        // Next tick moves at 0.4x speed: 2 * 0.4 * 0.05 = 0.04 cells.
        hold_input(&mut w, 1.0, 0.0, now + 1);
        let x_before = w.player.position.x;
        step(&mut w, Phase::Explore, now + 1, EXPLORE_END).unwrap();
        assert!((w.player.position.x - x_before - 0.04).abs() < 1e-9);
    }

    #[test]
    fn test_trap_does_not_retrigger_once_consumed() {
        let mut w = world();
        w.owner.traps.push(Trap {
            cell: Cell::new(5, 5),
            placed_at_tick: 0,
            consumed: true,
        });

        let outcome = step(&mut w, Phase::Explore, 1, EXPLORE_END).unwrap();
        assert!(outcome.events.is_empty());
        assert_eq!(w.player.slow_until, None);
    }

    #[test]
    fn test_prediction_hit_deactivates_and_awards() {
        let mut w = world();
        w.owner.prediction_marks.push(PredictionMark {
            cell: Cell::new(5, 5),
            active: true,
        });
        let stock_before = w.owner.wall_stock;
        let charges_before = w.owner.trap_charges;

        let outcome = step(&mut w, Phase::Explore, 1, EXPLORE_END).unwrap();

        assert_eq!(w.player.prediction_hits, 1);
        assert!(!w.owner.prediction_marks[0].active);
        let award = match outcome.events[0] {
            SimEvent::PredictionHit { award, .. } => award,
            ref other => panic!("expected prediction hit, got {other:?}"),
        };
        match award {
            BonusAward::Wall => {
                assert_eq!(w.owner.wall_stock, stock_before + 1);
                assert_eq!(w.owner.trap_charges, charges_before);
            }
            BonusAward::TrapCharge => {
                assert_eq!(w.owner.trap_charges, charges_before + 1);
                assert_eq!(w.owner.wall_stock, stock_before);
            }
        }
        // Matches the pinned RNG for this (seed, tick, index).
        assert_eq!(award, prediction_bonus(w.seed_hash, 1, 0));
    }

    #[test]
    fn test_prediction_hit_only_scores_once() {
        let mut w = world();
        w.owner.prediction_marks.push(PredictionMark {
            cell: Cell::new(5, 5),
            active: true,
        });

        step(&mut w, Phase::Explore, 1, EXPLORE_END).unwrap();
        let outcome = step(&mut w, Phase::Explore, 2, EXPLORE_END).unwrap();

        assert_eq!(w.player.prediction_hits, 1);
        assert!(outcome.events.is_empty());
    }

    #[test]
    fn test_point_pickup_increments_score_once() {
        let mut w = world();
        // The spawn cell carries no point; step onto a neighbor that does.
        w.player.position = Vector2::new(6.5, 5.5);
        assert!(w.points.contains(&Cell::new(6, 5)));

        step(&mut w, Phase::Explore, 1, EXPLORE_END).unwrap();
        assert_eq!(w.player.score, 1);
        assert!(!w.points.contains(&Cell::new(6, 5)));

        step(&mut w, Phase::Explore, 2, EXPLORE_END).unwrap();
        assert_eq!(w.player.score, 1);
    }

    #[test]
    fn test_goal_reach_awards_bonus_same_tick() {
        let mut w = world();
        let goal = w.maze.goal_cell();
        w.player.position = Vector2::cell_center(goal);
        let bonus = w.goal_bonus();
        assert!(bonus > 0);

        let outcome = step(&mut w, Phase::Explore, 1, EXPLORE_END).unwrap();

        assert!(outcome.events.contains(&SimEvent::GoalReached { bonus }));
        assert_eq!(w.player.score, bonus);
    }

    #[test]
    fn test_player_cannot_leave_the_maze() {
        let mut w = world();
        // Drive into the border for six seconds; collision must hold the
        // position inside.
        for now in 1..=120u64 {
            hold_input(&mut w, 1.0, 0.0, now);
            w.player.angle = PI; // face left toward the border
            step(&mut w, Phase::Explore, now, EXPLORE_END).unwrap();
        }
        assert!(w.maze.in_bounds(w.player.cell()));
        assert!(w.player.position.x >= 0.3);
    }
}
