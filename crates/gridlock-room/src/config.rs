//! Room configuration.

use std::time::Duration;

use gridlock_session::SessionConfig;
use gridlock_sim::constants::TICK_MS;
use gridlock_tick::TickConfig;

/// Configuration for a room instance. One copy is held by the directory
/// and cloned into every spawned room.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Tick scheduler settings. The rate must stay at the simulation's
    /// 20 Hz for live play; tests sometimes drop the jitter.
    pub tick: TickConfig,
    /// Countdown phase length.
    pub countdown: Duration,
    /// Prep phase length.
    pub prep: Duration,
    /// Explore phase length.
    pub explore: Duration,
    /// A room with no sessions for this long disposes itself.
    pub idle_timeout: Duration,
    /// Session timing and outbox knobs.
    pub session: SessionConfig,
    /// Fixed maze seed. `None` (the default) draws a random seed per
    /// game; tests pin it for reproducible mazes.
    pub maze_seed: Option<String>,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            tick: TickConfig::default(),
            countdown: Duration::from_secs(3),
            prep: Duration::from_secs(60),
            explore: Duration::from_secs(300),
            idle_timeout: Duration::from_secs(300),
            session: SessionConfig::default(),
            maze_seed: None,
        }
    }
}

impl RoomConfig {
    /// Converts a wall duration into simulation ticks.
    pub fn ticks(&self, duration: Duration) -> u64 {
        (duration.as_millis() as u64) / TICK_MS
    }

    pub fn countdown_ticks(&self) -> u64 {
        self.ticks(self.countdown)
    }

    pub fn prep_ticks(&self) -> u64 {
        self.ticks(self.prep)
    }

    pub fn explore_ticks(&self) -> u64 {
        self.ticks(self.explore)
    }

    pub fn grace_ticks(&self) -> u64 {
        self.ticks(self.session.disconnect_grace)
    }

    pub fn liveness_ticks(&self) -> u64 {
        self.ticks(self.session.liveness_timeout)
    }
}
