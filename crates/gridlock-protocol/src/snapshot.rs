//! Snapshot and delta payloads for `STATE` messages.
//!
//! A [`Snapshot`] is the complete client-visible room state as one plain
//! record. A [`Delta`] is a field-wise diff between two snapshots, with
//! explicit tombstone lists for removed traps, marks, and points — no
//! structural sharing, per-room state is a few kB at most. The broadcaster
//! decides per session whether to ship the snapshot or the delta; either
//! way the `seq` it carries is strictly increasing for that session.
//!
//! All absolute times (`updated_at`, `phase_ends_at`, `pause_expires_at`,
//! `edit_cooldown_until`, `slow_until`) are wall-clock milliseconds
//! derived from the room's fixed epoch, so an unchanged deadline encodes
//! to the same value in every broadcast and diffs stay quiet.

use gridlock_maze::{Cell, MazeCell, MazeState, Vector2};
use gridlock_sim::{Phase, PredictionMark, Trap};
use serde::{Deserialize, Serialize};

use crate::{Role, RoomCode, SessionId};

// ---------------------------------------------------------------------------
// Leaf views
// ---------------------------------------------------------------------------

/// Why the phase clock is paused.
///
/// A one-variant enum looks odd, but it buys two things: the wire form
/// is the string `"disconnect"` (not a boolean that would have to be
/// renamed if a second reason ever appears), and `Option<PauseReason>`
/// reads as "paused for this reason / not paused" at every use site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PauseReason {
    Disconnect,
}

/// One attached session as shown to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub role: Role,
    pub nick: String,
}

/// Client-visible player state.
///
/// This is a *view*, not the simulator's own `PlayerState`. The two are
/// deliberately separate types:
///
/// 1. The simulator carries fields clients must never see (the raw
///    input intent) and times in **ticks**; the wire carries times in
///    **wall-clock ms** so the client can render countdowns against
///    `updated_at`.
/// 2. Decoupling the shapes means a simulator refactor can't silently
///    change the protocol — the broadcaster converts explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub position: Vector2,
    pub velocity: Vector2,
    pub angle: f64,
    pub prediction_hits: u32,
    pub score: u32,
    /// Wall-clock ms the trap slow wears off, if slowed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slow_until: Option<u64>,
}

/// Client-visible owner state: resource counters, placements, and the
/// remaining point cells.
///
/// Same view-vs-state split as [`PlayerView`]: `edit_cooldown_until` is
/// wall-clock ms here (ticks inside the simulator), and the view adds
/// two things the sim doesn't track — the fixed cooldown duration the
/// HUD renders its radial timer from, and a mirror of the player's hit
/// counter so the owner screen can show it without the player section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerView {
    pub wall_stock: u32,
    pub wall_remove_left: u32,
    pub trap_charges: u32,
    /// Wall-clock ms the edit cooldown ends.
    pub edit_cooldown_until: u64,
    /// Fixed cooldown length in ms, for HUD countdowns.
    pub edit_cooldown_duration: u64,
    pub forbidden_distance: i32,
    pub prediction_limit: u32,
    /// Mirror of the player's hit counter for the owner HUD.
    pub prediction_hits: u32,
    pub prediction_marks: Vec<PredictionMark>,
    pub traps: Vec<Trap>,
    /// Cells still carrying a point.
    pub points: Vec<Cell>,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// The full client-visible room state.
///
/// A snapshot is self-sufficient: a client that receives one can render
/// the room with no prior context, which is what makes it the answer to
/// late joins, resyncs, and outbox overflows alike.
///
/// Optionality follows the room's lifecycle: `player`, `owner`, and
/// `maze` are absent until the owner starts the game; `phase_ends_at`
/// is absent in the open-ended phases (lobby, result) and while paused,
/// when `pause_remaining_ms` counts instead. The
/// `skip_serializing_if = "Option::is_none"` attributes keep absent
/// sections out of the JSON entirely — the client checks for presence,
/// not for null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub room_id: RoomCode,
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_ends_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maze_size: Option<u32>,
    pub updated_at: u64,
    pub countdown_duration_ms: u64,
    pub prep_duration_ms: u64,
    pub explore_duration_ms: u64,
    pub target_score: u32,
    pub point_compensation_award: u32,
    pub paused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_reason: Option<PauseReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_expires_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_remaining_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_phase: Option<Phase>,
    pub sessions: Vec<SessionInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<PlayerView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maze: Option<MazeState>,
}

// ---------------------------------------------------------------------------
// Delta
// ---------------------------------------------------------------------------

/// Field-wise difference between two snapshots.
///
/// The contract for a client applying one: absent fields are unchanged,
/// present fields replace their counterpart wholesale. There is no
/// structural sharing or per-field patch language — per-room state is a
/// few kB, so a plain record diff is both simpler and small enough.
///
/// Collections diff by cell key. `*_set` lists carry added **or
/// mutated** entries (a deactivated mark arrives via `marks_set` with
/// `active: false`); `*_removed` lists are tombstones naming cells the
/// client must forget. Without tombstones a delta could only grow
/// collections, never shrink them.
///
/// One deliberate gap: a phase change into an open-ended phase implies
/// the deadline is gone — deltas don't encode "deadline removed"
/// separately, because `Option<u64>` can't distinguish "unchanged" from
/// "now absent" without nesting options on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_ends_at: Option<u64>,
    pub updated_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_reason: Option<PauseReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_expires_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_remaining_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_phase: Option<Phase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sessions: Option<Vec<SessionInfo>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<PlayerView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wall_stock: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wall_remove_left: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trap_charges: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_cooldown_until: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction_hits: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marks_set: Vec<PredictionMark>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marks_removed: Vec<Cell>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traps_set: Vec<Trap>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traps_removed: Vec<Cell>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub points_removed: Vec<Cell>,
    /// Cells whose wall flags changed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cells_set: Vec<MazeCell>,
}

impl Delta {
    /// Computes the difference from `prev` to `next`.
    ///
    /// Pure field-by-field comparison — the owner/maze sections only
    /// diff when both sides are present. Not meaningful across maze
    /// materialisation (lobby → countdown); the broadcaster detects
    /// that structural change and sends a full snapshot instead.
    pub fn diff(prev: &Snapshot, next: &Snapshot) -> Delta {
        let mut delta = Delta {
            updated_at: next.updated_at,
            ..Delta::default()
        };

        if prev.phase != next.phase {
            delta.phase = Some(next.phase);
        }
        if prev.phase_ends_at != next.phase_ends_at {
            delta.phase_ends_at = next.phase_ends_at;
        }
        if prev.paused != next.paused {
            delta.paused = Some(next.paused);
        }
        if prev.pause_reason != next.pause_reason {
            delta.pause_reason = next.pause_reason;
        }
        if prev.pause_expires_at != next.pause_expires_at {
            delta.pause_expires_at = next.pause_expires_at;
        }
        if prev.pause_remaining_ms != next.pause_remaining_ms {
            delta.pause_remaining_ms = next.pause_remaining_ms;
        }
        if prev.pause_phase != next.pause_phase {
            delta.pause_phase = next.pause_phase;
        }
        if prev.sessions != next.sessions {
            delta.sessions = Some(next.sessions.clone());
        }
        if prev.player != next.player {
            delta.player = next.player;
        }

        if let (Some(p), Some(n)) = (&prev.owner, &next.owner) {
            if p.wall_stock != n.wall_stock {
                delta.wall_stock = Some(n.wall_stock);
            }
            if p.wall_remove_left != n.wall_remove_left {
                delta.wall_remove_left = Some(n.wall_remove_left);
            }
            if p.trap_charges != n.trap_charges {
                delta.trap_charges = Some(n.trap_charges);
            }
            if p.edit_cooldown_until != n.edit_cooldown_until {
                delta.edit_cooldown_until = Some(n.edit_cooldown_until);
            }
            if p.prediction_hits != n.prediction_hits {
                delta.prediction_hits = Some(n.prediction_hits);
            }

            for mark in &n.prediction_marks {
                if !p.prediction_marks.contains(mark) {
                    delta.marks_set.push(*mark);
                }
            }
            for mark in &p.prediction_marks {
                if !n.prediction_marks.iter().any(|m| m.cell == mark.cell) {
                    delta.marks_removed.push(mark.cell);
                }
            }

            for trap in &n.traps {
                if !p.traps.contains(trap) {
                    delta.traps_set.push(*trap);
                }
            }
            for trap in &p.traps {
                if !n.traps.iter().any(|t| t.cell == trap.cell) {
                    delta.traps_removed.push(trap.cell);
                }
            }

            for cell in &p.points {
                if !n.points.contains(cell) {
                    delta.points_removed.push(*cell);
                }
            }
        }

        if let (Some(p), Some(n)) = (&prev.maze, &next.maze) {
            for (pc, nc) in p.cells.iter().zip(&n.cells) {
                if pc != nc {
                    delta.cells_set.push(*nc);
                }
            }
        }

        delta
    }

    /// Whether the delta carries no change (timestamp aside).
    pub fn is_empty(&self) -> bool {
        self.phase.is_none()
            && self.phase_ends_at.is_none()
            && self.paused.is_none()
            && self.pause_reason.is_none()
            && self.pause_expires_at.is_none()
            && self.pause_remaining_ms.is_none()
            && self.pause_phase.is_none()
            && self.sessions.is_none()
            && self.player.is_none()
            && self.wall_stock.is_none()
            && self.wall_remove_left.is_none()
            && self.trap_charges.is_none()
            && self.edit_cooldown_until.is_none()
            && self.prediction_hits.is_none()
            && self.marks_set.is_empty()
            && self.marks_removed.is_empty()
            && self.traps_set.is_empty()
            && self.traps_removed.is_empty()
            && self.points_removed.is_empty()
            && self.cells_set.is_empty()
    }
}

// ---------------------------------------------------------------------------
// StatePayload
// ---------------------------------------------------------------------------

/// The body of a `STATE` message: either a full snapshot or a delta.
///
/// Modeled as one struct with a `full` discriminant and two optional
/// bodies rather than an enum: the client reads `full` first and then
/// knows which key to reach for, and the JSON stays flat —
/// `{ "seq": 7, "full": true, "snapshot": {...} }`. The constructors
/// below are the only way the server builds one, so `full` and the
/// populated body can't disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePayload {
    pub seq: u64,
    pub full: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Snapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<Delta>,
}

impl StatePayload {
    pub fn full(seq: u64, snapshot: Snapshot) -> Self {
        Self {
            seq,
            full: true,
            snapshot: Some(snapshot),
            changes: None,
        }
    }

    pub fn delta(seq: u64, changes: Delta) -> Self {
        Self {
            seq,
            full: false,
            snapshot: None,
            changes: Some(changes),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use gridlock_sim::World;

    fn snapshot_fixture() -> Snapshot {
        let world = World::new(MazeState::open_grid(20, "wire"));
        Snapshot {
            room_id: RoomCode::parse("AB23CD").unwrap(),
            phase: Phase::Prep,
            phase_ends_at: Some(100_000),
            maze_size: Some(world.maze.size),
            updated_at: 42_000,
            countdown_duration_ms: 3_000,
            prep_duration_ms: 60_000,
            explore_duration_ms: 300_000,
            target_score: world.target_score,
            point_compensation_award: world.goal_bonus(),
            paused: false,
            pause_reason: None,
            pause_expires_at: None,
            pause_remaining_ms: None,
            pause_phase: None,
            sessions: vec![SessionInfo {
                id: SessionId("a1b2c3d4".into()),
                role: Role::Owner,
                nick: "ARCHITECT".into(),
            }],
            player: Some(PlayerView {
                position: world.player.position,
                velocity: world.player.velocity,
                angle: world.player.angle,
                prediction_hits: 0,
                score: 0,
                slow_until: None,
            }),
            owner: Some(OwnerView {
                wall_stock: world.owner.wall_stock,
                wall_remove_left: world.owner.wall_remove_left,
                trap_charges: world.owner.trap_charges,
                edit_cooldown_until: 0,
                edit_cooldown_duration: 1_000,
                forbidden_distance: world.owner.forbidden_distance,
                prediction_limit: world.owner.prediction_limit,
                prediction_hits: 0,
                prediction_marks: Vec::new(),
                traps: Vec::new(),
                points: world.points.iter().copied().collect(),
            }),
            maze: Some(world.maze.clone()),
        }
    }

    #[test]
    fn test_snapshot_round_trips_through_json() {
        let snapshot = snapshot_fixture();
        let bytes = serde_json::to_vec(&snapshot).unwrap();
        let decoded: Snapshot = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(snapshot, decoded);
    }

    #[test]
    fn test_snapshot_uses_camel_case_keys() {
        let json: serde_json::Value = serde_json::to_value(snapshot_fixture()).unwrap();
        assert!(json.get("roomId").is_some());
        assert!(json.get("phaseEndsAt").is_some());
        assert!(json.get("mazeSize").is_some());
        assert!(json.get("updatedAt").is_some());
        assert!(json.get("targetScore").is_some());
        assert!(json.get("pointCompensationAward").is_some());
        assert!(json["owner"].get("wallStock").is_some());
        assert!(json["owner"].get("editCooldownDuration").is_some());
        assert!(json["owner"].get("predictionMarks").is_some());
        assert!(json["player"].get("predictionHits").is_some());
    }

    #[test]
    fn test_lobby_snapshot_omits_absent_sections() {
        let mut snapshot = snapshot_fixture();
        snapshot.phase = Phase::Lobby;
        snapshot.phase_ends_at = None;
        snapshot.maze_size = None;
        snapshot.player = None;
        snapshot.owner = None;
        snapshot.maze = None;

        let json: serde_json::Value = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("phaseEndsAt").is_none());
        assert!(json.get("player").is_none());
        assert!(json.get("owner").is_none());
        assert!(json.get("maze").is_none());
        assert_eq!(json["phase"], "lobby");
    }

    #[test]
    fn test_diff_of_identical_snapshots_is_empty() {
        let snapshot = snapshot_fixture();
        let delta = Delta::diff(&snapshot, &snapshot);
        assert!(delta.is_empty());
        assert_eq!(delta.updated_at, snapshot.updated_at);
    }

    #[test]
    fn test_diff_captures_player_movement() {
        let prev = snapshot_fixture();
        let mut next = prev.clone();
        let player = next.player.as_mut().unwrap();
        player.position.x += 0.1;
        next.updated_at += 50;

        let delta = Delta::diff(&prev, &next);

        assert!(!delta.is_empty());
        assert_eq!(delta.player, next.player);
        assert!(delta.wall_stock.is_none());
        assert!(delta.phase.is_none());
    }

    #[test]
    fn test_diff_emits_tombstones_for_removed_marks_and_points() {
        let prev = {
            let mut s = snapshot_fixture();
            let owner = s.owner.as_mut().unwrap();
            owner.prediction_marks.push(PredictionMark {
                cell: Cell::new(4, 4),
                active: true,
            });
            s
        };
        let mut next = prev.clone();
        {
            let owner = next.owner.as_mut().unwrap();
            owner.prediction_marks.clear();
            let taken = owner.points[0];
            owner.points.retain(|c| *c != taken);
        }

        let delta = Delta::diff(&prev, &next);

        assert_eq!(delta.marks_removed, vec![Cell::new(4, 4)]);
        assert_eq!(delta.points_removed.len(), 1);
        assert!(delta.marks_set.is_empty());
    }

    #[test]
    fn test_diff_reports_deactivated_mark_as_set() {
        let prev = {
            let mut s = snapshot_fixture();
            s.owner.as_mut().unwrap().prediction_marks.push(PredictionMark {
                cell: Cell::new(4, 4),
                active: true,
            });
            s
        };
        let mut next = prev.clone();
        next.owner.as_mut().unwrap().prediction_marks[0].active = false;

        let delta = Delta::diff(&prev, &next);

        assert_eq!(
            delta.marks_set,
            vec![PredictionMark {
                cell: Cell::new(4, 4),
                active: false
            }]
        );
        assert!(delta.marks_removed.is_empty());
    }

    #[test]
    fn test_diff_captures_wall_edit_as_cells_set() {
        let prev = snapshot_fixture();
        let mut next = prev.clone();
        next.maze
            .as_mut()
            .unwrap()
            .set_wall(gridlock_maze::EdgeRef::new(5, 5, gridlock_maze::Side::Right), true)
            .unwrap();
        next.owner.as_mut().unwrap().wall_stock -= 1;

        let delta = Delta::diff(&prev, &next);

        // Both incident cells changed.
        assert_eq!(delta.cells_set.len(), 2);
        assert_eq!(delta.wall_stock, Some(47));
    }

    #[test]
    fn test_diff_captures_pause_fields() {
        let prev = snapshot_fixture();
        let mut next = prev.clone();
        next.paused = true;
        next.pause_reason = Some(PauseReason::Disconnect);
        next.pause_expires_at = Some(200_000);
        next.pause_remaining_ms = Some(60_000);
        next.pause_phase = Some(Phase::Explore);

        let delta = Delta::diff(&prev, &next);

        assert_eq!(delta.paused, Some(true));
        assert_eq!(delta.pause_reason, Some(PauseReason::Disconnect));
        assert_eq!(delta.pause_remaining_ms, Some(60_000));
        assert_eq!(delta.pause_phase, Some(Phase::Explore));
    }

    #[test]
    fn test_state_payload_full_and_delta_shapes() {
        let full = StatePayload::full(7, snapshot_fixture());
        let json: serde_json::Value = serde_json::to_value(&full).unwrap();
        assert_eq!(json["seq"], 7);
        assert_eq!(json["full"], true);
        assert!(json.get("snapshot").is_some());
        assert!(json.get("changes").is_none());

        let delta = StatePayload::delta(8, Delta::default());
        let json: serde_json::Value = serde_json::to_value(&delta).unwrap();
        assert_eq!(json["full"], false);
        assert!(json.get("snapshot").is_none());
        assert!(json.get("changes").is_some());
    }

    #[test]
    fn test_delta_round_trips_through_json() {
        let prev = snapshot_fixture();
        let mut next = prev.clone();
        next.phase = Phase::Explore;
        next.player.as_mut().unwrap().score = 3;

        let delta = Delta::diff(&prev, &next);
        let bytes = serde_json::to_vec(&delta).unwrap();
        let decoded: Delta = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(delta, decoded);
    }
}
