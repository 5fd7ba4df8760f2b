//! The bounded per-session outbox.
//!
//! The room actor writes into the outbox synchronously (a `std` mutex held
//! for O(1) queue operations, never across an await); the connection's
//! writer task drains it onto the socket. This keeps the room's event loop
//! free of network backpressure.
//!
//! Overflow discipline: `STATE` messages are the only high-volume traffic,
//! and a full snapshot makes every buffered delta redundant. So when a
//! state push would overflow, the queued `STATE` entries are discarded and
//! the caller is told to push a full snapshot instead — the client
//! resynchronizes from that one message.

use std::collections::VecDeque;
use std::sync::Mutex;

use gridlock_protocol::{CloseReason, ServerMessage, StatePayload};
use tokio::sync::Notify;
use tracing::debug;

/// Returned when a state push would overflow the queue. The caller must
/// follow up with [`Outbox::push_full_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateOverflow;

struct Inner {
    queue: VecDeque<ServerMessage>,
    closed: Option<CloseReason>,
}

/// Bounded message queue between a room actor and one writer task.
pub struct Outbox {
    inner: Mutex<Inner>,
    notify: Notify,
    capacity: usize,
}

impl Outbox {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::with_capacity(capacity.min(64)),
                closed: None,
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    /// Queues a non-state message (`ERR`, `PONG`). Returns `false` if the
    /// queue is full or closed; such messages are droppable — the client
    /// either retries or resynchronizes from the next snapshot.
    pub fn push(&self, msg: ServerMessage) -> bool {
        let mut inner = self.inner.lock().expect("outbox lock poisoned");
        if inner.closed.is_some() || inner.queue.len() >= self.capacity {
            return false;
        }
        inner.queue.push_back(msg);
        drop(inner);
        self.notify.notify_one();
        true
    }

    /// Queues a `STATE` message.
    ///
    /// # Errors
    /// Returns [`StateOverflow`] if the queue is full. The queued `STATE`
    /// entries have then already been discarded, and the caller must queue
    /// a self-sufficient full snapshot via [`Self::push_full_state`].
    pub fn try_push_state(&self, payload: StatePayload) -> Result<(), StateOverflow> {
        let mut inner = self.inner.lock().expect("outbox lock poisoned");
        if inner.closed.is_some() {
            return Ok(()); // writer is gone; silently drop
        }
        if inner.queue.len() >= self.capacity {
            let before = inner.queue.len();
            inner
                .queue
                .retain(|m| !matches!(m, ServerMessage::State { .. }));
            debug!(
                dropped = before - inner.queue.len(),
                "outbox overflow — discarded buffered state"
            );
            return Err(StateOverflow);
        }
        inner.queue.push_back(ServerMessage::State { payload });
        drop(inner);
        self.notify.notify_one();
        Ok(())
    }

    /// Queues a full-snapshot `STATE`, evicting any buffered state first.
    /// Always succeeds while the outbox is open: the full snapshot
    /// supersedes everything it evicts.
    pub fn push_full_state(&self, payload: StatePayload) {
        debug_assert!(payload.full, "push_full_state requires a full payload");
        let mut inner = self.inner.lock().expect("outbox lock poisoned");
        if inner.closed.is_some() {
            return;
        }
        inner
            .queue
            .retain(|m| !matches!(m, ServerMessage::State { .. }));
        inner.queue.push_back(ServerMessage::State { payload });
        drop(inner);
        self.notify.notify_one();
    }

    /// Awaits the next message. Returns `None` once the outbox is closed
    /// and drained.
    pub async fn recv(&self) -> Option<ServerMessage> {
        loop {
            // Register interest before checking, so a push between the
            // check and the await cannot be lost.
            let notified = self.notify.notified();
            {
                let mut inner = self.inner.lock().expect("outbox lock poisoned");
                if let Some(msg) = inner.queue.pop_front() {
                    return Some(msg);
                }
                if inner.closed.is_some() {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Closes the outbox with the reason the writer task should put in
    /// the close frame. Queued messages are still drained by `recv`;
    /// the first close reason wins.
    pub fn close(&self, reason: CloseReason) {
        let mut inner = self.inner.lock().expect("outbox lock poisoned");
        if inner.closed.is_none() {
            inner.closed = Some(reason);
        }
        drop(inner);
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().expect("outbox lock poisoned").closed.is_some()
    }

    /// Why the outbox was closed, once it has been.
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.inner.lock().expect("outbox lock poisoned").closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("outbox lock poisoned").queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use gridlock_protocol::{CloseReason, Delta, ErrorCode};

    fn delta_payload(seq: u64) -> StatePayload {
        StatePayload::delta(
            seq,
            Delta {
                updated_at: seq * 50,
                ..Delta::default()
            },
        )
    }

    #[test]
    fn test_push_and_len() {
        let outbox = Outbox::new(4);
        assert!(outbox.is_empty());
        assert!(outbox.push(ServerMessage::Pong { ts: 1 }));
        assert_eq!(outbox.len(), 1);
    }

    #[tokio::test]
    async fn test_recv_returns_messages_in_order() {
        let outbox = Outbox::new(4);
        outbox.try_push_state(delta_payload(1)).unwrap();
        outbox.push(ServerMessage::Pong { ts: 9 });

        let first = outbox.recv().await.unwrap();
        assert!(matches!(first, ServerMessage::State { .. }));
        let second = outbox.recv().await.unwrap();
        assert_eq!(second, ServerMessage::Pong { ts: 9 });
    }

    #[tokio::test]
    async fn test_recv_after_close_drains_then_ends() {
        let outbox = Outbox::new(4);
        outbox.push(ServerMessage::Pong { ts: 1 });
        outbox.close(CloseReason::RoomClosed);

        assert_eq!(outbox.recv().await, Some(ServerMessage::Pong { ts: 1 }));
        assert_eq!(outbox.recv().await, None);
        assert_eq!(outbox.close_reason(), Some(CloseReason::RoomClosed));
    }

    #[test]
    fn test_first_close_reason_wins() {
        let outbox = Outbox::new(4);
        outbox.close(CloseReason::Takeover);
        outbox.close(CloseReason::Normal);
        assert_eq!(outbox.close_reason(), Some(CloseReason::Takeover));
    }

    #[test]
    fn test_state_overflow_discards_buffered_state() {
        let outbox = Outbox::new(2);
        outbox.try_push_state(delta_payload(1)).unwrap();
        outbox.try_push_state(delta_payload(2)).unwrap();

        let result = outbox.try_push_state(delta_payload(3));

        assert_eq!(result, Err(StateOverflow));
        assert!(outbox.is_empty(), "buffered deltas must be discarded");
    }

    #[test]
    fn test_overflow_keeps_non_state_messages() {
        let outbox = Outbox::new(2);
        outbox.push(ServerMessage::Err {
            code: ErrorCode::Cooldown,
        });
        outbox.try_push_state(delta_payload(1)).unwrap();

        let result = outbox.try_push_state(delta_payload(2));

        assert_eq!(result, Err(StateOverflow));
        assert_eq!(outbox.len(), 1, "the ERR must survive the purge");
    }

    #[test]
    fn test_push_full_state_supersedes_queued_state() {
        let outbox = Outbox::new(8);
        outbox.try_push_state(delta_payload(1)).unwrap();
        outbox.try_push_state(delta_payload(2)).unwrap();

        // A minimal "full" payload; the snapshot body is irrelevant here.
        let mut full = delta_payload(3);
        full.full = true;
        full.changes = None;
        outbox.push_full_state(full.clone());

        assert_eq!(outbox.len(), 1);
    }

    #[test]
    fn test_push_after_close_is_dropped() {
        let outbox = Outbox::new(4);
        outbox.close(CloseReason::Normal);
        assert!(!outbox.push(ServerMessage::Pong { ts: 1 }));
        // State pushes report success but go nowhere.
        assert!(outbox.try_push_state(delta_payload(1)).is_ok());
        assert!(outbox.is_empty());
    }

    #[tokio::test]
    async fn test_recv_wakes_on_push_from_another_task() {
        use std::sync::Arc;

        let outbox = Arc::new(Outbox::new(4));
        let reader = Arc::clone(&outbox);
        let handle = tokio::spawn(async move { reader.recv().await });

        // Give the reader a chance to park first.
        tokio::task::yield_now().await;
        outbox.push(ServerMessage::Pong { ts: 5 });

        let msg = handle.await.unwrap();
        assert_eq!(msg, Some(ServerMessage::Pong { ts: 5 }));
    }
}
