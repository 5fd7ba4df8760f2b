//! Snapshot assembly and per-session STATE fan-out.
//!
//! After every authoritative change the room builds one [`Snapshot`] and
//! hands it to the [`StateBroadcaster`], which decides per session whether
//! to ship it whole or as a [`Delta`] against the previous broadcast. The
//! rules:
//!
//! - A session that has never received state (or missed the previous
//!   broadcast, or predates the maze) gets a full snapshot.
//! - Otherwise it gets the delta — unless the encoded delta is no smaller
//!   than the snapshot itself, in which case the snapshot wins.
//! - An outbox overflow downgrades to a full snapshot; the outbox has
//!   already discarded the stale buffered state.
//!
//! All absolute times are derived from the room's fixed epoch so that an
//! unchanged deadline is byte-identical across broadcasts.

use gridlock_protocol::{
    Codec, Delta, JsonCodec, OwnerView, PlayerView, RoomCode, SessionInfo, Snapshot, StatePayload,
};
use gridlock_session::Session;
use gridlock_sim::World;
use gridlock_sim::constants::{OWNER_EDIT_COOLDOWN_TICKS, TICK_MS};
use tracing::{trace, warn};

use crate::{PhaseClock, RoomConfig};

/// Converts a room tick to wall-clock milliseconds.
fn tick_to_ms(epoch_ms: u64, tick: u64) -> u64 {
    epoch_ms + tick * TICK_MS
}

/// Builds the full client-visible snapshot of a room.
pub fn build_snapshot(
    code: &RoomCode,
    config: &RoomConfig,
    clock: &PhaseClock,
    world: Option<&World>,
    sessions: Vec<SessionInfo>,
    now: u64,
    epoch_ms: u64,
) -> Snapshot {
    let ms = |tick: u64| tick_to_ms(epoch_ms, tick);

    let player = world.map(|w| PlayerView {
        position: w.player.position,
        velocity: w.player.velocity,
        angle: w.player.angle,
        prediction_hits: w.player.prediction_hits,
        score: w.player.score,
        slow_until: w.player.slow_until.map(ms),
    });

    let owner = world.map(|w| OwnerView {
        wall_stock: w.owner.wall_stock,
        wall_remove_left: w.owner.wall_remove_left,
        trap_charges: w.owner.trap_charges,
        edit_cooldown_until: ms(w.owner.edit_cooldown_until),
        edit_cooldown_duration: OWNER_EDIT_COOLDOWN_TICKS * TICK_MS,
        forbidden_distance: w.owner.forbidden_distance,
        prediction_limit: w.owner.prediction_limit,
        prediction_hits: w.player.prediction_hits,
        prediction_marks: w.owner.prediction_marks.clone(),
        traps: w.owner.traps.clone(),
        points: w.points.iter().copied().collect(),
    });

    Snapshot {
        room_id: code.clone(),
        phase: clock.phase(),
        phase_ends_at: if clock.paused() {
            None
        } else {
            clock.phase_ends_at().map(ms)
        },
        maze_size: world.map(|w| w.maze.size),
        updated_at: ms(now),
        countdown_duration_ms: config.countdown.as_millis() as u64,
        prep_duration_ms: config.prep.as_millis() as u64,
        explore_duration_ms: config.explore.as_millis() as u64,
        target_score: world.map_or(0, |w| w.target_score),
        point_compensation_award: world.map_or(0, |w| w.goal_bonus()),
        paused: clock.paused(),
        pause_reason: clock.pause_reason(),
        pause_expires_at: clock.pause_expires_at().map(ms),
        pause_remaining_ms: clock
            .pause_expires_at()
            .map(|at| at.saturating_sub(now) * TICK_MS),
        pause_phase: clock.pause_phase(),
        sessions,
        player,
        owner,
        maze: world.map(|w| w.maze.clone()),
    }
}

/// Per-room broadcast state: the previous snapshot and its sequence.
pub struct StateBroadcaster {
    codec: JsonCodec,
    last_snapshot: Option<Snapshot>,
    last_seq: u64,
}

impl StateBroadcaster {
    pub fn new() -> Self {
        Self {
            codec: JsonCodec,
            last_snapshot: None,
            last_seq: 0,
        }
    }

    /// Sequence of the most recent broadcast.
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// Fans `snapshot` (stamped `seq`) out to `sessions`, choosing full
    /// or delta per session, and records it as the new baseline.
    pub fn broadcast<'a>(
        &mut self,
        seq: u64,
        snapshot: Snapshot,
        sessions: impl IntoIterator<Item = &'a mut Session>,
    ) {
        let full_payload = StatePayload::full(seq, snapshot.clone());
        // Encoded sizes decide delta-vs-full; encode the snapshot once.
        let full_len = self.encoded_len(&full_payload);

        let delta = self.last_snapshot.as_ref().map(|prev| {
            let d = Delta::diff(prev, &snapshot);
            let payload = StatePayload::delta(seq, d);
            let len = self.encoded_len(&payload);
            (payload, len)
        });

        for session in sessions {
            let in_sync = session.last_sent_seq >= 0
                && session.last_sent_seq as u64 == self.last_seq
                && self
                    .last_snapshot
                    .as_ref()
                    .is_some_and(|prev| prev.maze.is_some() == snapshot.maze.is_some());

            let sent_delta = match (&delta, in_sync) {
                (Some((payload, len)), true) if *len < full_len => {
                    match session.outbox.try_push_state(payload.clone()) {
                        Ok(()) => true,
                        Err(_) => {
                            warn!(session = %session.id, "outbox overflow — downgrading to full snapshot");
                            session.outbox.push_full_state(full_payload.clone());
                            false
                        }
                    }
                }
                _ => {
                    session.outbox.push_full_state(full_payload.clone());
                    false
                }
            };

            trace!(session = %session.id, seq, delta = sent_delta, "state queued");
            session.last_sent_seq = seq as i64;
        }

        self.last_snapshot = Some(snapshot);
        self.last_seq = seq;
    }

    fn encoded_len(&self, payload: &StatePayload) -> usize {
        self.codec.encode(payload).map(|b| b.len()).unwrap_or(usize::MAX)
    }
}

impl Default for StateBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================
