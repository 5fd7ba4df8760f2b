//! The room actor: an isolated Tokio task that owns one game instance.
//!
//! Everything that can mutate room state — ticks, client commands,
//! session lifecycle — flows through one mpsc queue drained by a single
//! task, joined with the tick scheduler in a `select!`. No locks guard
//! room state because nothing else can reach it; the outside world holds
//! a cheap [`RoomHandle`].
//!
//! Event sources and their ordering guarantees:
//! 1. the 20 Hz tick (phase clock, simulation, liveness, broadcast),
//! 2. commands from attached sessions (validated synchronously), and
//! 3. session lifecycle (attach/detach).
//!
//! A validated command bumps the room sequence and triggers an immediate
//! broadcast on top of the tick cadence; a rejection goes back to the
//! offending session alone and perturbs nothing.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use gridlock_maze::MazeFactory;
use gridlock_protocol::{
    ClientMessage, CloseReason, ErrorCode, PauseReason, Role, RoomCode, ServerMessage, SessionId,
    SessionInfo,
};
use gridlock_session::{Outbox, Session};
use gridlock_sim::{Phase, SimEvent, World, step};
use gridlock_tick::TickScheduler;
use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::broadcast::{StateBroadcaster, build_snapshot};
use crate::validator;
use crate::{PhaseClock, PhaseEvent, RoomConfig, RoomError};

/// How many validated edits the diagnostic ring remembers. A room fault
/// is reported together with what led up to it.
const EDIT_LOG_CAPACITY: usize = 32;

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    /// Seat a session. An occupied seat is taken over: the old session is
    /// closed with the `takeover` code.
    Attach {
        role: Role,
        nick: String,
        outbox: Arc<Outbox>,
        reply: oneshot::Sender<SessionId>,
    },

    /// The connection behind a session is gone (socket closed or silent).
    Detach { session_id: SessionId },

    /// A decoded client message.
    Message {
        session_id: SessionId,
        msg: ClientMessage,
    },

    /// Liveness signal outside the message flow (protocol pong).
    Heard { session_id: SessionId },

    /// Request room metadata (directory sweep, diagnostics).
    GetInfo { reply: oneshot::Sender<RoomInfo> },

    /// Dispose of the room.
    Shutdown,
}

/// A snapshot of room metadata (not the game state itself).
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub code: RoomCode,
    pub phase: Phase,
    pub session_count: usize,
    /// How long the room has had no sessions, if currently empty.
    pub empty_for: Option<Duration>,
}

/// Handle to a running room actor. Cheap to clone.
#[derive(Clone)]
pub struct RoomHandle {
    code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// Seats a session in the room and returns its id.
    pub async fn attach(
        &self,
        role: Role,
        nick: String,
        outbox: Arc<Outbox>,
    ) -> Result<SessionId, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Attach {
                role,
                nick,
                outbox,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }

    pub async fn detach(&self, session_id: SessionId) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Detach { session_id })
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }

    /// Delivers a client message (fire-and-forget).
    pub async fn message(
        &self,
        session_id: SessionId,
        msg: ClientMessage,
    ) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Message { session_id, msg })
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }

    /// Marks the session alive (protocol pong arrived).
    pub async fn heard(&self, session_id: SessionId) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Heard { session_id })
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }

    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::GetInfo { reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }

    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    code: RoomCode,
    config: RoomConfig,
    factory: Arc<dyn MazeFactory>,
    receiver: mpsc::Receiver<RoomCommand>,
    scheduler: TickScheduler,
    clock: PhaseClock,
    world: Option<World>,
    owner_slot: Option<Session>,
    player_slot: Option<Session>,
    /// Monotone room sequence; bumps on every authoritative change.
    seq: u64,
    /// Current room tick.
    now: u64,
    broadcaster: StateBroadcaster,
    /// Wall-clock ms at actor start; tick N maps to `epoch_ms + N * 50`.
    epoch_ms: u64,
    empty_since: Option<Instant>,
    /// Ring of recently applied edits, e.g. `"PLACE_WALL@1312 owner"`.
    edit_log: VecDeque<String>,
}

impl RoomActor {
    async fn run(mut self) {
        info!(room = %self.code, "room actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    match cmd {
                        Some(RoomCommand::Shutdown) | None => {
                            info!(room = %self.code, "room shutting down");
                            break;
                        }
                        Some(cmd) => self.handle_command(cmd),
                    }
                }
                tick = self.scheduler.wait_for_tick() => {
                    self.now = tick.tick;
                    let fatal = self.on_tick();
                    self.scheduler.record_tick_end();
                    if fatal {
                        break;
                    }
                    if self.idle_expired() {
                        info!(room = %self.code, "idle room disposing itself");
                        break;
                    }
                }
            }
        }

        self.close_all(CloseReason::RoomClosed);
        info!(room = %self.code, ticks = self.now, "room actor stopped");
    }

    // -----------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------

    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Attach {
                role,
                nick,
                outbox,
                reply,
            } => {
                let id = self.handle_attach(role, nick, outbox);
                let _ = reply.send(id);
            }
            RoomCommand::Detach { session_id } => self.handle_detach(session_id),
            RoomCommand::Message { session_id, msg } => self.handle_message(session_id, msg),
            RoomCommand::Heard { session_id } => {
                let now = self.now;
                if let Some(session) = self.session_mut(&session_id) {
                    session.mark_heard(now);
                }
            }
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::Shutdown => unreachable!("handled in run()"),
        }
    }

    fn handle_attach(&mut self, role: Role, nick: String, outbox: Arc<Outbox>) -> SessionId {
        let session = Session::new(role, nick, outbox, self.now);
        let id = session.id.clone();
        info!(room = %self.code, %role, session = %id, nick = %session.nick, "session attached");

        let slot = match role {
            Role::Owner => &mut self.owner_slot,
            Role::Player => &mut self.player_slot,
        };
        if let Some(old) = slot.replace(session) {
            info!(room = %self.code, %role, displaced = %old.id, "role takeover");
            old.outbox.push(ServerMessage::Err {
                code: ErrorCode::Takeover,
            });
            old.outbox.close(CloseReason::Takeover);
        }
        self.empty_since = None;

        // A reconnect that fills the absent seat resumes the game with
        // the remainder captured at pause.
        if self.clock.paused() && self.clock.absent() == Some(role) {
            self.clock.resume(self.now);
            info!(room = %self.code, %role, "absent side returned — resuming");
        }

        self.seq += 1;
        self.broadcast_now();
        id
    }

    fn handle_detach(&mut self, session_id: SessionId) {
        let Some(role) = self.role_of(&session_id) else {
            debug!(room = %self.code, session = %session_id, "detach for stale session");
            return;
        };
        let slot = match role {
            Role::Owner => &mut self.owner_slot,
            Role::Player => &mut self.player_slot,
        };
        let old = slot.take().expect("role_of verified occupancy");
        old.outbox.close(CloseReason::Normal);
        info!(room = %self.code, %role, session = %session_id, "session detached");

        if self.owner_slot.is_none() && self.player_slot.is_none() {
            self.empty_since = Some(Instant::now());
        }

        // Mid-game absence pauses the phase clock; lobby and result just
        // shed the seat.
        if matches!(
            self.clock.phase(),
            Phase::Countdown | Phase::Prep | Phase::Explore
        ) {
            self.clock.pause(
                PauseReason::Disconnect,
                role,
                self.config.grace_ticks(),
                self.now,
            );
        }

        self.seq += 1;
        self.broadcast_now();
    }

    fn handle_message(&mut self, session_id: SessionId, msg: ClientMessage) {
        let Some(role) = self.role_of(&session_id) else {
            debug!(room = %self.code, session = %session_id, "message from stale session");
            return;
        };
        let now = self.now;
        if let Some(session) = self.session_mut(&session_id) {
            session.mark_heard(now);
        }

        match msg {
            ClientMessage::Ping { ts } => {
                if let Some(session) = self.session_mut(&session_id) {
                    session.outbox.push(ServerMessage::Pong { ts });
                }
            }

            ClientMessage::Input { forward, turn, seq } => {
                if role != Role::Player {
                    self.reject(&session_id, ErrorCode::InvalidArg);
                    return;
                }
                let Some(world) = self.world.as_mut() else {
                    self.reject(&session_id, ErrorCode::InvalidPhase);
                    return;
                };
                let session = self
                    .player_slot
                    .as_mut()
                    .expect("player session verified above");
                let result = validator::apply_input(
                    world,
                    self.clock.phase(),
                    self.clock.paused(),
                    self.now,
                    &mut session.last_input_seq,
                    forward,
                    turn,
                    seq,
                );
                // Applied input surfaces through the next simulation
                // tick's broadcast; replays are dropped silently.
                if let Err(code) = result {
                    self.reject(&session_id, code);
                }
            }

            ClientMessage::Start { maze_size } => {
                if role != Role::Owner {
                    self.reject(&session_id, ErrorCode::InvalidArg);
                    return;
                }
                self.handle_start(&session_id, maze_size);
            }

            ClientMessage::Edit { edit } => {
                if role != Role::Owner {
                    self.reject(&session_id, ErrorCode::InvalidArg);
                    return;
                }
                let Some(world) = self.world.as_mut() else {
                    self.reject(&session_id, ErrorCode::InvalidPhase);
                    return;
                };
                let result = validator::apply_edit(
                    world,
                    self.clock.phase(),
                    self.clock.paused(),
                    self.now,
                    &edit,
                );
                match result {
                    Ok(()) => {
                        self.log_edit(role, edit_kind(&edit));
                        self.seq += 1;
                        self.broadcast_now();
                    }
                    Err(code) => self.reject(&session_id, code),
                }
            }

            ClientMessage::Mark { cell, active } => {
                if role != Role::Owner {
                    self.reject(&session_id, ErrorCode::InvalidArg);
                    return;
                }
                let Some(world) = self.world.as_mut() else {
                    self.reject(&session_id, ErrorCode::InvalidPhase);
                    return;
                };
                let result = validator::apply_mark(
                    world,
                    self.clock.phase(),
                    self.clock.paused(),
                    cell,
                    active,
                );
                match result {
                    Ok(()) => {
                        self.log_edit(role, if active { "MARK_SET" } else { "MARK_CLEAR" });
                        self.seq += 1;
                        self.broadcast_now();
                    }
                    Err(code) => self.reject(&session_id, code),
                }
            }
        }
    }

    fn handle_start(&mut self, session_id: &SessionId, maze_size: u32) {
        let both_present = self.owner_slot.is_some() && self.player_slot.is_some();
        if let Err(code) = validator::validate_start(self.clock.phase(), both_present, maze_size) {
            self.reject(session_id, code);
            return;
        }

        let seed = self
            .config
            .maze_seed
            .clone()
            .unwrap_or_else(generate_maze_seed);
        match self.factory.generate(maze_size, &seed) {
            Ok(maze) => {
                info!(room = %self.code, maze_size, seed = %seed, "game starting");
                self.world = Some(World::new(maze));
                self.clock.enter(
                    Phase::Countdown,
                    Some(self.config.countdown_ticks()),
                    self.now,
                );
                self.log_edit(Role::Owner, "START");
                self.seq += 1;
                self.broadcast_now();
            }
            Err(e) => {
                warn!(room = %self.code, error = %e, "maze generation rejected");
                self.reject(session_id, ErrorCode::InvalidArg);
            }
        }
    }

    // -----------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------

    /// One room tick. Returns `true` on a fatal simulation fault.
    fn on_tick(&mut self) -> bool {
        let now = self.now;

        // Liveness: anything silent past the timeout is treated as gone.
        // `last_heard_at` is refreshed by every inbound frame, including
        // the pongs the connection's writer task elicits every 5 s.
        let liveness = self.config.liveness_ticks();
        let stale: Vec<SessionId> = self
            .owner_slot
            .iter()
            .chain(self.player_slot.iter())
            .filter(|s| now.saturating_sub(s.last_heard_at) > liveness)
            .map(|s| s.id.clone())
            .collect();
        for id in stale {
            warn!(room = %self.code, session = %id, "session silent past liveness timeout");
            self.handle_detach(id);
        }

        match self.clock.tick(now) {
            Some(PhaseEvent::PhaseExpired) => self.advance_phase(),
            Some(PhaseEvent::PauseTimeout { absent }) => self.finish_by_timeout(absent),
            None => {}
        }

        if !self.clock.paused()
            && matches!(
                self.clock.phase(),
                Phase::Countdown | Phase::Prep | Phase::Explore
            )
        {
            if let Some(world) = self.world.as_mut() {
                let explore_ends = self.clock.phase_ends_at().unwrap_or(now);
                match step(world, self.clock.phase(), now, explore_ends) {
                    Ok(outcome) => {
                        if outcome.changed() {
                            self.seq += 1;
                        }
                        let goal = outcome
                            .events
                            .iter()
                            .any(|e| matches!(e, SimEvent::GoalReached { .. }));
                        if goal {
                            info!(room = %self.code, score = world.player.score, "goal reached — game over");
                            self.clock.enter(Phase::Result, None, now);
                        }
                    }
                    Err(e) => {
                        error!(
                            room = %self.code,
                            error = %e,
                            recent_edits = ?self.edit_log,
                            "simulation invariant violated — failing room"
                        );
                        self.clock.enter(Phase::Result, None, now);
                        self.seq += 1;
                        self.broadcast_now();
                        return true;
                    }
                }
            }
        }

        // Broadcast: every authoritative change once, plus a 1 Hz
        // heartbeat while paused so clients can count the grace down.
        if self.clock.paused() {
            if now % 20 == 0 {
                self.seq += 1;
                self.broadcast_now();
            }
        } else if self.seq > self.broadcaster.last_seq() {
            self.broadcast_now();
        }

        false
    }

    fn advance_phase(&mut self) {
        let now = self.now;
        match self.clock.phase() {
            Phase::Countdown => {
                self.clock
                    .enter(Phase::Prep, Some(self.config.prep_ticks()), now);
            }
            Phase::Prep => {
                self.clock
                    .enter(Phase::Explore, Some(self.config.explore_ticks()), now);
            }
            Phase::Explore => {
                let score = self.world.as_ref().map_or(0, |w| w.player.score);
                info!(room = %self.code, score, "explore time over");
                self.clock.enter(Phase::Result, None, now);
            }
            Phase::Lobby | Phase::Result => return,
        }
        self.seq += 1;
    }

    fn finish_by_timeout(&mut self, absent: Role) {
        info!(room = %self.code, %absent, "pause grace expired — absent side loses");

        // A player left mid-run by a vanished owner is made whole with
        // the compensation award.
        if absent == Role::Owner
            && self.clock.pause_phase() == Some(Phase::Explore)
            && self.player_slot.is_some()
        {
            if let Some(world) = self.world.as_mut() {
                let award = world.goal_bonus();
                world.player.score += award;
                info!(room = %self.code, award, "point compensation granted");
            }
        }

        self.clock.enter(Phase::Result, None, self.now);
        self.seq += 1;
        self.broadcast_now();
    }

    // -----------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------

    fn broadcast_now(&mut self) {
        let infos: Vec<SessionInfo> = self
            .owner_slot
            .iter()
            .chain(self.player_slot.iter())
            .map(Session::info)
            .collect();
        let snapshot = build_snapshot(
            &self.code,
            &self.config,
            &self.clock,
            self.world.as_ref(),
            infos,
            self.now,
            self.epoch_ms,
        );
        self.broadcaster.broadcast(
            self.seq,
            snapshot,
            self.owner_slot.iter_mut().chain(self.player_slot.iter_mut()),
        );
    }

    fn log_edit(&mut self, role: Role, kind: &'static str) {
        if self.edit_log.len() == EDIT_LOG_CAPACITY {
            self.edit_log.pop_front();
        }
        self.edit_log.push_back(format!("{kind}@{} {role}", self.now));
    }

    fn reject(&mut self, session_id: &SessionId, code: ErrorCode) {
        debug!(room = %self.code, session = %session_id, %code, "command rejected");
        if let Some(session) = self.session_mut(session_id) {
            session.outbox.push(ServerMessage::Err { code });
        }
    }

    fn role_of(&self, id: &SessionId) -> Option<Role> {
        if self.owner_slot.as_ref().is_some_and(|s| &s.id == id) {
            return Some(Role::Owner);
        }
        if self.player_slot.as_ref().is_some_and(|s| &s.id == id) {
            return Some(Role::Player);
        }
        None
    }

    fn session_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        if self.owner_slot.as_ref().is_some_and(|s| &s.id == id) {
            return self.owner_slot.as_mut();
        }
        if self.player_slot.as_ref().is_some_and(|s| &s.id == id) {
            return self.player_slot.as_mut();
        }
        None
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            code: self.code.clone(),
            phase: self.clock.phase(),
            session_count: self.owner_slot.iter().chain(self.player_slot.iter()).count(),
            empty_for: self.empty_since.map(|t| t.elapsed()),
        }
    }

    fn idle_expired(&self) -> bool {
        self.empty_since
            .is_some_and(|t| t.elapsed() > self.config.idle_timeout)
    }

    fn close_all(&mut self, reason: CloseReason) {
        for slot in [self.owner_slot.take(), self.player_slot.take()] {
            if let Some(session) = slot {
                session.outbox.close(reason);
            }
        }
    }
}

fn edit_kind(edit: &gridlock_protocol::EditRequest) -> &'static str {
    match edit.action {
        gridlock_protocol::EditAction::PlaceWall => "PLACE_WALL",
        gridlock_protocol::EditAction::RemoveWall => "REMOVE_WALL",
        gridlock_protocol::EditAction::PlaceTrap => "PLACE_TRAP",
    }
}

/// Random 16-hex maze seed for a fresh game.
fn generate_maze_seed() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 8] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Spawns a new room actor task and returns a handle to communicate
/// with it. `channel_size` bounds the command queue; senders wait when
/// it is full.
pub(crate) fn spawn_room(
    code: RoomCode,
    config: RoomConfig,
    factory: Arc<dyn MazeFactory>,
    channel_size: usize,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(channel_size);

    let epoch_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    let actor = RoomActor {
        code: code.clone(),
        scheduler: TickScheduler::new(config.tick.clone()),
        config,
        factory,
        receiver: rx,
        clock: PhaseClock::new(),
        world: None,
        owner_slot: None,
        player_slot: None,
        seq: 0,
        now: 0,
        broadcaster: StateBroadcaster::new(),
        epoch_ms,
        empty_since: None,
        edit_log: VecDeque::with_capacity(EDIT_LOG_CAPACITY),
    };

    tokio::spawn(actor.run());

    RoomHandle { code, sender: tx }
}
