//! The process-wide room directory: code allocation, lookup, eviction.
//!
//! This is the only state shared across rooms. The map sits behind a
//! `std` mutex held strictly for O(1) operations — allocation retries,
//! actor spawning, and the idle sweep all happen outside the lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gridlock_maze::MazeFactory;
use gridlock_protocol::{ROOM_CODE_ALPHABET, ROOM_CODE_LEN, RoomCode};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::room::spawn_room;
use crate::{RoomConfig, RoomError, RoomHandle};

/// Default command channel size for room actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Attempts before declaring the code space exhausted. The space holds
/// 32^6 ≈ 1.07e9 codes, so hitting this means something is deeply wrong.
const MAX_ALLOCATION_ATTEMPTS: usize = 64;

/// Creates, tracks, and evicts rooms.
pub struct RoomDirectory {
    rooms: Mutex<HashMap<RoomCode, RoomHandle>>,
    config: RoomConfig,
    factory: Arc<dyn MazeFactory>,
}

impl RoomDirectory {
    pub fn new(config: RoomConfig, factory: Arc<dyn MazeFactory>) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            config,
            factory,
        }
    }

    /// Allocates a fresh room code, spawns its actor, and returns the
    /// code.
    ///
    /// # Errors
    /// [`RoomError::CodesExhausted`] if no unique code was found within
    /// the retry budget.
    pub fn create_room(&self) -> Result<RoomCode, RoomError> {
        for _ in 0..MAX_ALLOCATION_ATTEMPTS {
            let code = generate_code();
            let handle = spawn_room(
                code.clone(),
                self.config.clone(),
                Arc::clone(&self.factory),
                DEFAULT_CHANNEL_SIZE,
            );

            let mut rooms = self.rooms.lock().expect("directory lock poisoned");
            if rooms.contains_key(&code) {
                // Collision: discard this freshly spawned actor and retry.
                drop(rooms);
                let dup = handle;
                tokio::spawn(async move {
                    let _ = dup.shutdown().await;
                });
                continue;
            }
            rooms.insert(code.clone(), handle);
            drop(rooms);

            info!(room = %code, "room created");
            return Ok(code);
        }

        warn!("room code allocation exhausted retries");
        Err(RoomError::CodesExhausted)
    }

    /// Case-normalised lookup.
    pub fn get(&self, code: &RoomCode) -> Option<RoomHandle> {
        self.rooms
            .lock()
            .expect("directory lock poisoned")
            .get(code)
            .cloned()
    }

    /// Removes a room and tells its actor to shut down. Idempotent.
    pub async fn evict(&self, code: &RoomCode) {
        let handle = self
            .rooms
            .lock()
            .expect("directory lock poisoned")
            .remove(code);
        if let Some(handle) = handle {
            info!(room = %code, "room evicted");
            let _ = handle.shutdown().await;
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.lock().expect("directory lock poisoned").len()
    }

    /// One pass over all rooms: drops handles whose actor is gone and
    /// evicts rooms that have sat empty past the idle timeout.
    pub async fn sweep(&self) {
        let handles: Vec<RoomHandle> = self
            .rooms
            .lock()
            .expect("directory lock poisoned")
            .values()
            .cloned()
            .collect();

        for handle in handles {
            match handle.info().await {
                Ok(info) => {
                    if info
                        .empty_for
                        .is_some_and(|d| d > self.config.idle_timeout)
                    {
                        self.evict(handle.code()).await;
                    }
                }
                Err(_) => {
                    // The actor already stopped (idle self-disposal or a
                    // fatal fault); drop the stale handle.
                    debug!(room = %handle.code(), "pruning dead room handle");
                    self.rooms
                        .lock()
                        .expect("directory lock poisoned")
                        .remove(handle.code());
                }
            }
        }
    }

    /// Spawns the periodic sweep task.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let directory = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                directory.sweep().await;
            }
        })
    }
}

/// Draws a 6-character code from the Crockford-like alphabet.
fn generate_code() -> RoomCode {
    let mut rng = rand::rng();
    let raw: String = (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect();
    RoomCode::parse(&raw).expect("generated code is always valid")
}

// =========================================================================
// Tests
// =========================================================================
