//! The phase clock: a tick-denominated scheduler for the game's phase
//! state machine, with pause accounting for disconnects.
//!
//! ```text
//! lobby     --owner O_START-->        countdown
//! countdown --duration elapses-->     prep
//! prep      --duration elapses-->     explore
//! explore   --duration elapses-->     result
//! explore   --player at goal-->       result
//! *         --pause-timeout-->        result (absent side loses)
//! ```
//!
//! Pause stores the *remaining duration*, not an absolute deadline, so
//! repeated pause/resume cycles cannot drift the phase end.

use gridlock_protocol::{PauseReason, Role};
use gridlock_sim::Phase;
use tracing::debug;

/// What [`PhaseClock::tick`] wants the room to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// The current phase's deadline passed.
    PhaseExpired,
    /// The pause grace ran out; the named side never came back.
    PauseTimeout { absent: Role },
}

/// Monotonic phase scheduler. All times are room ticks.
#[derive(Debug, Clone)]
pub struct PhaseClock {
    phase: Phase,
    phase_ends_at: Option<u64>,
    paused: bool,
    pause_reason: Option<PauseReason>,
    absent: Option<Role>,
    pause_expires_at: Option<u64>,
    pause_phase: Option<Phase>,
    remainder_at_pause: Option<u64>,
}

impl PhaseClock {
    /// A clock in the open-ended lobby phase.
    pub fn new() -> Self {
        Self {
            phase: Phase::Lobby,
            phase_ends_at: None,
            paused: false,
            pause_reason: None,
            absent: None,
            pause_expires_at: None,
            pause_phase: None,
            remainder_at_pause: None,
        }
    }

    /// Enters `phase` with an optional deadline `duration` ticks from
    /// `now`. Idempotent when already in `phase` with a live deadline.
    /// Clears any pause.
    pub fn enter(&mut self, phase: Phase, duration: Option<u64>, now: u64) {
        if self.phase == phase && self.phase_ends_at.is_some_and(|ends| ends > now) {
            return;
        }
        debug!(from = %self.phase, to = %phase, ?duration, now, "phase transition");
        self.phase = phase;
        self.phase_ends_at = duration.map(|d| now + d);
        self.clear_pause();
    }

    /// Checks deadlines. While paused only the grace deadline counts —
    /// the phase deadline is frozen as a remainder.
    pub fn tick(&self, now: u64) -> Option<PhaseEvent> {
        if self.paused {
            if self.pause_expires_at.is_some_and(|at| now >= at) {
                return Some(PhaseEvent::PauseTimeout {
                    absent: self.absent.expect("paused clock always names the absent side"),
                });
            }
            return None;
        }
        if self.phase_ends_at.is_some_and(|ends| now >= ends) {
            return Some(PhaseEvent::PhaseExpired);
        }
        None
    }

    /// Halts the phase deadline, capturing the remainder. No-op while
    /// already paused — the first absence owns the grace window.
    pub fn pause(&mut self, reason: PauseReason, absent: Role, grace: u64, now: u64) {
        if self.paused {
            return;
        }
        self.paused = true;
        self.pause_reason = Some(reason);
        self.absent = Some(absent);
        self.pause_expires_at = Some(now + grace);
        self.pause_phase = Some(self.phase);
        self.remainder_at_pause = self.phase_ends_at.map(|ends| ends.saturating_sub(now));
        debug!(phase = %self.phase, %absent, grace, now, "phase clock paused");
    }

    /// Resumes from pause, restoring the deadline from the captured
    /// remainder.
    pub fn resume(&mut self, now: u64) {
        if !self.paused {
            return;
        }
        if let Some(remainder) = self.remainder_at_pause {
            self.phase_ends_at = Some(now + remainder);
        }
        debug!(phase = %self.phase, now, ends_at = ?self.phase_ends_at, "phase clock resumed");
        self.clear_pause();
    }

    fn clear_pause(&mut self) {
        self.paused = false;
        self.pause_reason = None;
        self.absent = None;
        self.pause_expires_at = None;
        self.pause_phase = None;
        self.remainder_at_pause = None;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn phase_ends_at(&self) -> Option<u64> {
        self.phase_ends_at
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn pause_reason(&self) -> Option<PauseReason> {
        self.pause_reason
    }

    pub fn absent(&self) -> Option<Role> {
        self.absent
    }

    pub fn pause_expires_at(&self) -> Option<u64> {
        self.pause_expires_at
    }

    pub fn pause_phase(&self) -> Option<Phase> {
        self.pause_phase
    }

    /// Ticks until the phase deadline: the frozen remainder while
    /// paused, the live distance otherwise.
    pub fn remaining(&self, now: u64) -> Option<u64> {
        if self.paused {
            self.remainder_at_pause
        } else {
            self.phase_ends_at.map(|ends| ends.saturating_sub(now))
        }
    }
}

impl Default for PhaseClock {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================
