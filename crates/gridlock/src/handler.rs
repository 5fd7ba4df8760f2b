//! Per-connection handler: handshake, attach, and frame routing.
//!
//! Each accepted WebSocket gets its own task running [`handle_connection`].
//! The flow:
//!   1. Parse `room`, `role`, `nick` from the upgrade request's query.
//!   2. Look the room up and attach (taking the seat over if needed).
//!   3. Spawn the writer task: drains the session outbox onto the socket
//!      and sends a protocol ping every 5 s.
//!   4. Read loop: decode frames into [`ClientMessage`]s for the room;
//!      15 s of silence or a parse failure ends the connection.
//!
//! The room closes the outbox with a [`CloseReason`]; the writer puts
//! that reason in the close frame, so takeover and eviction reach the
//! client with the right code.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use gridlock_protocol::{
    ClientMessage, CloseReason, Codec, ErrorCode, JsonCodec, Role, RoomCode, ServerMessage,
};
use gridlock_room::{RoomDirectory, RoomHandle};
use gridlock_session::{Outbox, SessionConfig, validate_nick};
use gridlock_transport::{Connection, Incoming, WebSocketConnection};
use tracing::{debug, info, warn};

use crate::GridlockError;

/// The parsed attach parameters from the `/ws` query string.
#[derive(Debug, PartialEq)]
pub(crate) struct HandshakeParams {
    pub room: RoomCode,
    pub role: Role,
    pub nick: String,
}

/// What went wrong with a handshake, and which `ERR` to send before the
/// `invalid-handshake` close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandshakeRejection {
    BadQuery,
    BadNick,
    UnknownRoom,
}

impl HandshakeRejection {
    fn error_code(self) -> Option<ErrorCode> {
        match self {
            HandshakeRejection::BadQuery => None,
            HandshakeRejection::BadNick => Some(ErrorCode::InvalidName),
            HandshakeRejection::UnknownRoom => Some(ErrorCode::InvalidRoom),
        }
    }
}

impl HandshakeParams {
    /// Parses `/ws?room=<code>&role=owner|player&nick=<2..10 chars>`.
    ///
    /// The nick charset (`A-Z0-9_-`) never needs percent-decoding, so a
    /// plain split suffices.
    pub(crate) fn parse(uri: &str) -> Result<HandshakeParams, HandshakeRejection> {
        let (path, query) = uri.split_once('?').ok_or(HandshakeRejection::BadQuery)?;
        if path != "/ws" {
            return Err(HandshakeRejection::BadQuery);
        }

        let mut room = None;
        let mut role = None;
        let mut nick = None;
        for pair in query.split('&') {
            let (key, value) = pair.split_once('=').ok_or(HandshakeRejection::BadQuery)?;
            match key {
                "room" => room = RoomCode::parse(value),
                "role" => role = value.parse::<Role>().ok(),
                "nick" => nick = Some(value.to_string()),
                _ => {} // unknown parameters are ignored
            }
        }

        let room = room.ok_or(HandshakeRejection::BadQuery)?;
        let role = role.ok_or(HandshakeRejection::BadQuery)?;
        let nick = nick.ok_or(HandshakeRejection::BadQuery)?;
        if let Err(e) = validate_nick(&nick) {
            debug!(error = %e, "handshake nickname rejected");
            return Err(HandshakeRejection::BadNick);
        }

        Ok(HandshakeParams { room, role, nick })
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    directory: Arc<RoomDirectory>,
    config: SessionConfig,
) -> Result<(), GridlockError> {
    let conn_id = conn.id();
    let codec = JsonCodec;

    // --- Step 1: handshake query ---
    let params = match HandshakeParams::parse(conn.request_uri()) {
        Ok(params) => params,
        Err(rejection) => {
            return reject_handshake(&conn, &codec, rejection).await;
        }
    };

    // --- Step 2: room lookup and attach ---
    let Some(room) = directory.get(&params.room) else {
        return reject_handshake(&conn, &codec, HandshakeRejection::UnknownRoom).await;
    };

    let outbox = Arc::new(Outbox::new(config.outbox_capacity));
    let attach = tokio::time::timeout(
        config.handshake_timeout,
        room.attach(params.role, params.nick.clone(), Arc::clone(&outbox)),
    )
    .await;
    let session_id = match attach {
        Ok(Ok(id)) => id,
        Ok(Err(_)) | Err(_) => {
            // The room actor died between lookup and attach, or is jammed.
            return reject_handshake(&conn, &codec, HandshakeRejection::UnknownRoom).await;
        }
    };

    info!(%conn_id, room = %params.room, role = %params.role, session = %session_id, "client attached");

    // --- Step 3: writer task ---
    let conn = Arc::new(conn);
    let writer = tokio::spawn(writer_task(
        Arc::clone(&conn),
        Arc::clone(&outbox),
        codec,
        config.ping_interval,
    ));

    // --- Step 4: read loop ---
    read_loop(&conn, &room, &session_id, &codec, config.liveness_timeout).await;

    // Socket is gone (or silent): hand the seat back. Stale ids after a
    // takeover are ignored by the room.
    let _ = room.detach(session_id).await;
    // Detach closes the outbox, which lets the writer finish.
    let _ = writer.await;

    Ok(())
}

async fn reject_handshake(
    conn: &WebSocketConnection,
    codec: &JsonCodec,
    rejection: HandshakeRejection,
) -> Result<(), GridlockError> {
    debug!(conn = %conn.id(), ?rejection, uri = conn.request_uri(), "handshake rejected");
    if let Some(code) = rejection.error_code() {
        if let Ok(bytes) = codec.encode(&ServerMessage::Err { code }) {
            let _ = conn.send(&bytes).await;
        }
    }
    let reason = CloseReason::InvalidHandshake;
    let _ = conn.close_with(reason.code(), reason.reason()).await;
    Ok(())
}

async fn read_loop(
    conn: &WebSocketConnection,
    room: &RoomHandle,
    session_id: &gridlock_protocol::SessionId,
    codec: &JsonCodec,
    liveness_timeout: Duration,
) {
    loop {
        match tokio::time::timeout(liveness_timeout, conn.recv()).await {
            Ok(Ok(Some(Incoming::Data(data)))) => {
                let msg: ClientMessage = match codec.decode(&data) {
                    Ok(msg) => msg,
                    Err(e) => {
                        // Parse failures are a protocol breach, not a
                        // game error: drop the connection.
                        warn!(session = %session_id, error = %e, "unparseable frame");
                        let reason = CloseReason::InvalidHandshake;
                        let _ = conn.close_with(reason.code(), reason.reason()).await;
                        return;
                    }
                };
                if room.message(session_id.clone(), msg).await.is_err() {
                    return; // room is gone
                }
            }
            Ok(Ok(Some(Incoming::Pong(payload)))) => {
                if let Ok(sent) = <[u8; 8]>::try_from(payload.as_slice()) {
                    let rtt = now_ms().saturating_sub(u64::from_be_bytes(sent));
                    debug!(session = %session_id, rtt_ms = rtt, "pong");
                }
                if room.heard(session_id.clone()).await.is_err() {
                    return;
                }
            }
            Ok(Ok(None)) => {
                info!(session = %session_id, "connection closed by client");
                return;
            }
            Ok(Err(e)) => {
                debug!(session = %session_id, error = %e, "recv error");
                return;
            }
            Err(_) => {
                info!(session = %session_id, "connection silent past liveness timeout");
                return;
            }
        }
    }
}

/// Drains the outbox onto the socket and keeps the connection alive with
/// protocol pings. Ends when the outbox closes (detach, takeover,
/// eviction) or the socket breaks.
async fn writer_task(
    conn: Arc<WebSocketConnection>,
    outbox: Arc<Outbox>,
    codec: JsonCodec,
    ping_interval: Duration,
) {
    let mut ping = tokio::time::interval_at(
        tokio::time::Instant::now() + ping_interval,
        ping_interval,
    );
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            msg = outbox.recv() => {
                match msg {
                    Some(msg) => {
                        let bytes = match codec.encode(&msg) {
                            Ok(bytes) => bytes,
                            Err(e) => {
                                warn!(error = %e, "dropping unencodable message");
                                continue;
                            }
                        };
                        if conn.send(&bytes).await.is_err() {
                            return;
                        }
                    }
                    None => {
                        let reason = outbox.close_reason().unwrap_or(CloseReason::Normal);
                        let _ = conn.close_with(reason.code(), reason.reason()).await;
                        return;
                    }
                }
            }
            _ = ping.tick() => {
                let ts = now_ms().to_be_bytes();
                if conn.send_ping(&ts).await.is_err() {
                    return;
                }
            }
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
