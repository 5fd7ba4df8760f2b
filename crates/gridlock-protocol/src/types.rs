//! Core wire types for Gridlock's protocol.
//!
//! This module defines every identity and message type that travels "on
//! the wire" — meaning these are the structures that get serialized to
//! JSON, sent over the WebSocket, and deserialized on the other side.
//!
//! Think of this as the "language" that the browser client and the
//! server speak. Every message is an object with a `type` field; the
//! shapes here are pinned by tests because a mismatch means the client
//! can't parse our frames.

// We import traits and macros from the `serde` crate. Serde is Rust's
// standard library for **ser**ializing and **de**serializing data. The
// two key traits:
//   - `Serialize`:   "I can be turned INTO bytes/JSON/etc."
//   - `Deserialize`: "I can be created FROM bytes/JSON/etc."
// The `derive` macro auto-generates these implementations for our types.
use serde::{Deserialize, Serialize};

// We also need `fmt` for implementing Display (human-readable printing —
// every id type here shows up in tracing fields).
use std::fmt;

use gridlock_maze::{Cell, EdgeRef};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a connected session.
///
/// This is a "newtype wrapper" — a common Rust pattern where you wrap a
/// primitive type (here `String`) in a named struct. Why bother?
///
/// 1. **Type safety**: You can't accidentally pass a `RoomCode` where a
///    `SessionId` is expected, even though both are strings underneath.
/// 2. **Readability**: `fn detach(session: SessionId)` is clearer than
///    `fn detach(session: String)`.
///
/// The `#[serde(transparent)]` attribute tells serde to serialize this
/// as just the inner string, not as `{ "0": "a1b2c3d4" }`. So a
/// `SessionId("a1b2c3d4")` becomes just `"a1b2c3d4"` in JSON.
///
/// The id is random hex assigned by the server at attach. It is not a
/// secret — reconnection is positional (room + role + nick) — it exists
/// for log lines and the snapshot's session list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

/// Display lets us use `{}` in format strings and logging.
/// `tracing::info!("session {} attached", id)` prints "session s-a1b2c3d4".
impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s-{}", self.0)
    }
}

/// Alphabet for room codes: Crockford-like base32 with the ambiguous
/// 0/1/I/O removed. Codes are read aloud and typed by players, so every
/// symbol must survive a phone call.
pub const ROOM_CODE_ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";

/// Length of a room code. 32^6 ≈ 1.07 billion combinations — plenty of
/// headroom above any realistic live-room count.
pub const ROOM_CODE_LEN: usize = 6;

/// A 6-character room code drawn from [`ROOM_CODE_ALPHABET`].
///
/// Same newtype pattern as [`SessionId`]. A room is one game instance:
/// one owner, one player, one maze.
///
/// Lookup is case-insensitive: [`RoomCode::parse`] uppercases before
/// validating, so `abc234` and `ABC234` name the same room. The parsed
/// form is the only way to construct a `RoomCode` — if you hold one, it
/// is already normalized and valid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Normalizes and validates a candidate code.
    ///
    /// Returns `None` (rather than an error type) because every caller
    /// treats a bad code the same way: reject the handshake or the
    /// lookup. There's no detail worth carrying.
    pub fn parse(raw: &str) -> Option<RoomCode> {
        let code = raw.trim().to_ascii_uppercase();
        if code.len() != ROOM_CODE_LEN {
            return None;
        }
        if !code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b)) {
            return None;
        }
        Some(RoomCode(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Which side of the asymmetric game a session plays.
///
/// This is a Rust `enum` — a closed set of alternatives the compiler
/// checks exhaustively. Anywhere the server matches on a `Role`, adding
/// a third role later would be a compile error at every match site,
/// which is exactly what you want for a two-sided game.
///
/// `#[serde(rename_all = "lowercase")]` makes the JSON representation
/// `"owner"` / `"player"`, matching the `role=` query parameter the
/// client sends in the connection URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Designs and edits the maze.
    Owner,
    /// Navigates the maze in first person.
    Player,
}

/// `FromStr` is the standard trait behind `str::parse`. The handshake
/// parser uses it to turn the raw `role=` query value into a `Role`.
/// Note it is strict: `"Owner"` (capitalized) is rejected, because the
/// connection URL contract is lowercase.
impl std::str::FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Role::Owner),
            "player" => Ok(Role::Player),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Owner => write!(f, "owner"),
            Role::Player => write!(f, "player"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error codes and close reasons
// ---------------------------------------------------------------------------

/// The closed set of error codes surfaced to clients in `ERR` messages.
///
/// "Closed set" is a protocol promise: clients switch on these strings
/// to decide between a toast (`INVALID_ROOM`, `INVALID_NAME`), a HUD
/// flash during edits (`COOLDOWN`, `NO_RESOURCE`, `FORBIDDEN_AREA`,
/// `DISCONNECTS_MAZE`), or a silent log line. Nothing else ever appears
/// in an `ERR` frame.
///
/// `#[serde(rename_all = "SCREAMING_SNAKE_CASE")]` turns the Rust-style
/// variant names into the wire form: `InvalidPhase` → `"INVALID_PHASE"`.
/// One attribute instead of twelve `#[serde(rename = "...")]` lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidPhase,
    Cooldown,
    NoResource,
    ForbiddenArea,
    DisconnectsMaze,
    OutOfBounds,
    InvalidArg,
    InvalidRoom,
    InvalidName,
    RoomFull,
    Takeover,
    NetworkError,
}

/// Display mirrors the wire form exactly, so a logged code and a
/// captured frame always read the same. A test cross-checks this list
/// against the serde output — the two must never drift apart.
impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::InvalidPhase => "INVALID_PHASE",
            ErrorCode::Cooldown => "COOLDOWN",
            ErrorCode::NoResource => "NO_RESOURCE",
            ErrorCode::ForbiddenArea => "FORBIDDEN_AREA",
            ErrorCode::DisconnectsMaze => "DISCONNECTS_MAZE",
            ErrorCode::OutOfBounds => "OUT_OF_BOUNDS",
            ErrorCode::InvalidArg => "INVALID_ARG",
            ErrorCode::InvalidRoom => "INVALID_ROOM",
            ErrorCode::InvalidName => "INVALID_NAME",
            ErrorCode::RoomFull => "ROOM_FULL",
            ErrorCode::Takeover => "TAKEOVER",
            ErrorCode::NetworkError => "NETWORK_ERROR",
        };
        f.write_str(s)
    }
}

/// Why the server closed a WebSocket.
///
/// Close reasons travel in the WebSocket close frame, not in a JSON
/// message — by the time one is sent, the conversation is over. Clients
/// read the code/reason pair to decide whether to show "you were
/// replaced" (takeover), "room is gone" (room-closed), or "check your
/// link" (invalid-handshake).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Normal close (1000).
    Normal,
    /// The role was reclaimed by a newer connection.
    Takeover,
    /// The room was evicted or disposed.
    RoomClosed,
    /// The upgrade request's query was unusable.
    InvalidHandshake,
}

impl CloseReason {
    /// WebSocket close code.
    ///
    /// The WebSocket spec reserves 1000–2999 for the protocol itself and
    /// 3000–3999 for registered use; 4000–4999 is the private-use range,
    /// which is where application-defined reasons like ours belong.
    pub fn code(self) -> u16 {
        match self {
            CloseReason::Normal => 1000,
            CloseReason::Takeover => 4001,
            CloseReason::RoomClosed => 4002,
            CloseReason::InvalidHandshake => 4003,
        }
    }

    /// Close-frame reason string, matched by clients.
    pub fn reason(self) -> &'static str {
        match self {
            CloseReason::Normal => "",
            CloseReason::Takeover => "takeover",
            CloseReason::RoomClosed => "room-closed",
            CloseReason::InvalidHandshake => "invalid-handshake",
        }
    }
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Owner edit actions.
///
/// Same SCREAMING_SNAKE_CASE treatment as [`ErrorCode`]: the wire says
/// `"PLACE_WALL"`, the Rust code says `PlaceWall`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EditAction {
    PlaceWall,
    RemoveWall,
    PlaceTrap,
}

/// The body of an `O_EDIT` message.
///
/// Wall actions carry `edge`, trap placement carries `cell`. Both fields
/// are `Option` because JSON from the client simply omits the one that
/// doesn't apply — `#[serde(default)]` makes a missing key decode as
/// `None` instead of failing, and `skip_serializing_if` keeps our own
/// output symmetric. The validator, not the deserializer, rejects a
/// request whose action/field combination doesn't line up; that way the
/// client gets a proper `INVALID_ARG` instead of a dropped socket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EditRequest {
    pub action: EditAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell: Option<Cell>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge: Option<EdgeRef>,
}

/// Messages clients send to the server.
///
/// `#[serde(tag = "type")]` is a serde attribute that controls how this
/// enum is represented in JSON. Instead of:
///   `{ "Input": { "forward": 1.0, ... } }`
/// it produces:
///   `{ "type": "P_INPUT", "forward": 1.0, ... }`
/// This "internally tagged" format is what the browser client emits and
/// is trivial to switch on in JavaScript.
///
/// The `#[serde(rename = "...")]` on each variant maps the terse wire
/// tags (`P_INPUT`, `O_START`, ...) onto idiomatic Rust names. The `P_`
/// and `O_` prefixes mark which role may legally send the message; the
/// room enforces that, not the parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Player movement intent: throttle and turn rate, each in [-1, 1].
    /// `seq` is monotone per session; replays of an old sequence are
    /// dropped without error so a retrying client isn't spammed.
    #[serde(rename = "P_INPUT")]
    Input { forward: f64, turn: f64, seq: u64 },

    /// Owner starts the game from the lobby. `mazeSize` is 20 or 40;
    /// anything else earns an `INVALID_ARG`.
    #[serde(rename = "O_START")]
    Start {
        #[serde(rename = "mazeSize")]
        maze_size: u32,
    },

    /// Owner edit (wall placement/removal, trap placement).
    #[serde(rename = "O_EDIT")]
    Edit { edit: EditRequest },

    /// Owner places (`active: true`) or clears a prediction mark.
    #[serde(rename = "O_MRK")]
    Mark { cell: Cell, active: bool },

    /// Liveness probe; the server echoes `ts` back in a `PONG` so the
    /// client can measure round-trip time.
    #[serde(rename = "PING")]
    Ping { ts: u64 },
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Messages the server sends to clients.
///
/// Deliberately tiny: almost everything a client learns arrives inside
/// `STATE`. Keeping the surface to three message kinds means a client's
/// receive loop is one switch with no forgotten cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Authoritative state, full or delta. See [`crate::StatePayload`].
    #[serde(rename = "STATE")]
    State { payload: crate::StatePayload },

    /// Echo of a client `PING` — the `ts` is the client's own timestamp,
    /// returned untouched.
    #[serde(rename = "PONG")]
    Pong { ts: u64 },

    /// A rejected command; sent only to the offending session. The rest
    /// of the room never learns a command was attempted.
    #[serde(rename = "ERR")]
    Err { code: ErrorCode },
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Tests for protocol types and their JSON serialization.
    //!
    //! The wire shapes are a contract with the browser client. These
    //! tests verify that our serde attributes produce the exact format,
    //! because a mismatch means the client can't parse our messages.

    use super::*;
    use gridlock_maze::Side;

    // =====================================================================
    // RoomCode
    // =====================================================================

    #[test]
    fn test_room_code_parse_normalizes_case() {
        let code = RoomCode::parse("ab23cd").unwrap();
        assert_eq!(code.as_str(), "AB23CD");
        assert_eq!(code, RoomCode::parse("AB23CD").unwrap());
    }

    #[test]
    fn test_room_code_rejects_wrong_length() {
        assert!(RoomCode::parse("ABC23").is_none());
        assert!(RoomCode::parse("ABC2345").is_none());
        assert!(RoomCode::parse("").is_none());
    }

    #[test]
    fn test_room_code_rejects_ambiguous_symbols() {
        // 0, 1, I, O are excluded from the alphabet — over the phone,
        // "oh" and "zero" are the same sound.
        assert!(RoomCode::parse("ABC120").is_none());
        assert!(RoomCode::parse("ABCDI2").is_none());
        assert!(RoomCode::parse("ABCDO2").is_none());
    }

    #[test]
    fn test_room_code_serializes_as_plain_string() {
        // `#[serde(transparent)]` means the code serializes as a bare
        // string, not a wrapper object.
        let code = RoomCode::parse("AB23CD").unwrap();
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"AB23CD\"");
    }

    // =====================================================================
    // Role
    // =====================================================================

    #[test]
    fn test_role_from_str_matches_query_values() {
        assert_eq!("owner".parse::<Role>(), Ok(Role::Owner));
        assert_eq!("player".parse::<Role>(), Ok(Role::Player));
        assert!("spectator".parse::<Role>().is_err());
        assert!("Owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Owner).unwrap(), "\"owner\"");
    }

    // =====================================================================
    // ErrorCode and CloseReason
    // =====================================================================

    #[test]
    fn test_error_code_serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&ErrorCode::DisconnectsMaze).unwrap(),
            "\"DISCONNECTS_MAZE\""
        );
        assert_eq!(
            serde_json::to_string(&ErrorCode::Cooldown).unwrap(),
            "\"COOLDOWN\""
        );
    }

    #[test]
    fn test_error_code_display_matches_wire_form() {
        // The Display impl is hand-written; this guards against it
        // drifting from the serde derive.
        let codes = [
            ErrorCode::InvalidPhase,
            ErrorCode::NoResource,
            ErrorCode::ForbiddenArea,
            ErrorCode::OutOfBounds,
            ErrorCode::InvalidArg,
            ErrorCode::Takeover,
        ];
        for code in codes {
            let wire = serde_json::to_string(&code).unwrap();
            assert_eq!(wire, format!("\"{code}\""));
        }
    }

    #[test]
    fn test_close_reasons_use_4000_range() {
        assert_eq!(CloseReason::Normal.code(), 1000);
        assert_eq!(CloseReason::Takeover.code(), 4001);
        assert_eq!(CloseReason::RoomClosed.code(), 4002);
        assert_eq!(CloseReason::InvalidHandshake.code(), 4003);
        assert_eq!(CloseReason::Takeover.reason(), "takeover");
        assert_eq!(CloseReason::RoomClosed.reason(), "room-closed");
        assert_eq!(CloseReason::InvalidHandshake.reason(), "invalid-handshake");
    }

    // =====================================================================
    // ClientMessage JSON shapes — one test per variant
    // =====================================================================

    #[test]
    fn test_p_input_json_shape() {
        // `#[serde(tag = "type")]` produces internally tagged JSON:
        //   { "type": "P_INPUT", "forward": 1.0, "turn": -0.5, "seq": 17 }
        let msg = ClientMessage::Input {
            forward: 1.0,
            turn: -0.5,
            seq: 17,
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "P_INPUT");
        assert_eq!(json["forward"], 1.0);
        assert_eq!(json["turn"], -0.5);
        assert_eq!(json["seq"], 17);
    }

    #[test]
    fn test_p_input_parses_from_client_json() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"P_INPUT","forward":0.5,"turn":0,"seq":3}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Input {
                forward: 0.5,
                turn: 0.0,
                seq: 3
            }
        );
    }

    #[test]
    fn test_o_start_uses_maze_size_key() {
        // The wire key is camelCase `mazeSize`, the Rust field is
        // snake_case `maze_size`; the rename bridges them.
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"O_START","mazeSize":20}"#).unwrap();
        assert_eq!(msg, ClientMessage::Start { maze_size: 20 });
    }

    #[test]
    fn test_o_edit_place_wall_carries_edge() {
        let json = r#"{"type":"O_EDIT","edit":{"action":"PLACE_WALL","edge":{"x":3,"y":4,"side":"right"}}}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        let ClientMessage::Edit { edit } = msg else {
            panic!("expected O_EDIT");
        };
        assert_eq!(edit.action, EditAction::PlaceWall);
        assert_eq!(edit.edge, Some(EdgeRef::new(3, 4, Side::Right)));
        // The cell key is absent in the JSON → `#[serde(default)]` None.
        assert_eq!(edit.cell, None);
    }

    #[test]
    fn test_o_edit_place_trap_carries_cell() {
        let json = r#"{"type":"O_EDIT","edit":{"action":"PLACE_TRAP","cell":{"x":6,"y":6}}}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        let ClientMessage::Edit { edit } = msg else {
            panic!("expected O_EDIT");
        };
        assert_eq!(edit.action, EditAction::PlaceTrap);
        assert_eq!(edit.cell, Some(Cell::new(6, 6)));
    }

    #[test]
    fn test_o_mrk_round_trip() {
        let msg = ClientMessage::Mark {
            cell: Cell::new(2, 9),
            active: true,
        };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: ClientMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_ping_round_trip() {
        let msg = ClientMessage::Ping { ts: 123456 };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: ClientMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_unknown_type_tag_fails_to_parse() {
        // A message with an unknown "type" tag should fail rather than
        // silently match some variant.
        let result: Result<ClientMessage, _> =
            serde_json::from_str(r#"{"type":"FLY_TO_MOON","speed":9000}"#);
        assert!(result.is_err());
    }

    // =====================================================================
    // ServerMessage
    // =====================================================================

    #[test]
    fn test_pong_echoes_ts() {
        let msg = ServerMessage::Pong { ts: 777 };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "PONG");
        assert_eq!(json["ts"], 777);
    }

    #[test]
    fn test_err_json_shape() {
        let msg = ServerMessage::Err {
            code: ErrorCode::ForbiddenArea,
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "ERR");
        assert_eq!(json["code"], "FORBIDDEN_AREA");
    }
}
