//! End-to-end tests: a real server, real sockets, JSON frames.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use gridlock::GridlockServer;
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tower::ServiceExt;

type WsClient = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

// =========================================================================
// Harness
// =========================================================================

/// Boots a server on ephemeral ports; returns the ws URL base and the
/// shared directory.
async fn start_server() -> (String, Arc<gridlock_room::RoomDirectory>) {
    let server = GridlockServer::builder()
        .bind_ws("127.0.0.1:0")
        .bind_http("127.0.0.1:0")
        .build()
        .await
        .expect("server builds");
    let ws_addr = server.ws_addr().unwrap();
    let directory = server.directory();
    tokio::spawn(server.run());
    (format!("ws://{ws_addr}"), directory)
}

async fn connect(base: &str, room: &str, role: &str, nick: &str) -> WsClient {
    let url = format!("{base}/ws?room={room}&role={role}&nick={nick}");
    let (ws, _) = connect_async(url).await.expect("ws connect");
    ws
}

/// Next JSON message, skipping protocol frames. Panics on close.
async fn next_json(ws: &mut WsClient) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(10), ws.next())
            .await
            .expect("timed out")
            .expect("stream ended")
            .expect("ws error");
        match msg {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Close(frame) => panic!("unexpected close: {frame:?}"),
            _ => continue,
        }
    }
}

/// Waits for the close frame, skipping anything else.
async fn next_close(ws: &mut WsClient) -> (u16, String) {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(10), ws.next())
            .await
            .expect("timed out")
            .expect("stream ended")
            .expect("ws error");
        if let Message::Close(Some(frame)) = msg {
            return (u16::from(frame.code), frame.reason.to_string());
        }
    }
}

async fn send_json(ws: &mut WsClient, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("send");
}

/// Next STATE message (skips PONG and ERR-free traffic).
async fn next_state(ws: &mut WsClient) -> Value {
    loop {
        let msg = next_json(ws).await;
        if msg["type"] == "STATE" {
            return msg;
        }
    }
}

// =========================================================================
// HTTP
// =========================================================================

#[tokio::test]
async fn test_post_rooms_returns_fresh_code() {
    let (_, directory) = start_server().await;
    let router = gridlock::router(directory);

    let response = router
        .oneshot(
            axum::http::Request::builder()
                .method("POST")
                .uri("/rooms")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    let code = body["roomId"].as_str().expect("roomId string");
    assert_eq!(code.len(), 6);
}

#[tokio::test]
async fn test_get_rooms_is_rejected() {
    let (_, directory) = start_server().await;
    let router = gridlock::router(directory);

    let response = router
        .oneshot(
            axum::http::Request::builder()
                .method("GET")
                .uri("/rooms")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), axum::http::StatusCode::METHOD_NOT_ALLOWED);
}

// =========================================================================
// Handshake failures
// =========================================================================

#[tokio::test]
async fn test_missing_query_closes_with_invalid_handshake() {
    let (base, _) = start_server().await;
    let (mut ws, _) = connect_async(format!("{base}/ws")).await.unwrap();

    let (code, reason) = next_close(&mut ws).await;
    assert_eq!(code, 4003);
    assert_eq!(reason, "invalid-handshake");
}

#[tokio::test]
async fn test_unknown_room_gets_err_then_close() {
    let (base, _) = start_server().await;
    let mut ws = connect(&base, "ZZZZZZ", "owner", "BUILDER").await;

    let err = next_json(&mut ws).await;
    assert_eq!(err["type"], "ERR");
    assert_eq!(err["code"], "INVALID_ROOM");

    let (code, reason) = next_close(&mut ws).await;
    assert_eq!(code, 4003);
    assert_eq!(reason, "invalid-handshake");
}

#[tokio::test]
async fn test_invalid_nick_gets_err_then_close() {
    let (base, directory) = start_server().await;
    let room = directory.create_room().unwrap();
    let mut ws = connect(&base, room.as_str(), "owner", "x").await;

    let err = next_json(&mut ws).await;
    assert_eq!(err["code"], "INVALID_NAME");

    let (code, _) = next_close(&mut ws).await;
    assert_eq!(code, 4003);
}

// =========================================================================
// Game flow over real sockets
// =========================================================================

#[tokio::test]
async fn test_attach_receives_lobby_snapshot() {
    let (base, directory) = start_server().await;
    let room = directory.create_room().unwrap();

    let mut owner = connect(&base, room.as_str(), "owner", "BUILDER").await;
    let state = next_state(&mut owner).await;

    assert_eq!(state["payload"]["full"], true);
    let snapshot = &state["payload"]["snapshot"];
    assert_eq!(snapshot["phase"], "lobby");
    assert_eq!(snapshot["roomId"], room.as_str());
    assert_eq!(snapshot["sessions"][0]["nick"], "BUILDER");
    assert!(snapshot.get("maze").is_none());
}

#[tokio::test]
async fn test_room_code_lookup_is_case_insensitive() {
    let (base, directory) = start_server().await;
    let room = directory.create_room().unwrap();

    let mut ws = connect(&base, &room.as_str().to_ascii_lowercase(), "player", "RUNNER").await;
    let state = next_state(&mut ws).await;
    assert_eq!(state["payload"]["snapshot"]["roomId"], room.as_str());
}

#[tokio::test]
async fn test_start_flows_to_countdown_with_maze() {
    let (base, directory) = start_server().await;
    let room = directory.create_room().unwrap();

    let mut owner = connect(&base, room.as_str(), "owner", "BUILDER").await;
    next_state(&mut owner).await;
    let mut player = connect(&base, room.as_str(), "player", "RUNNER").await;
    next_state(&mut player).await;

    // The owner sees the player arrive.
    let joined = next_state(&mut owner).await;
    let sessions = joined["payload"]["snapshot"]
        .get("sessions")
        .or_else(|| joined["payload"]["changes"].get("sessions"))
        .expect("session change broadcast");
    assert_eq!(sessions.as_array().unwrap().len(), 2);

    send_json(&mut owner, json!({"type": "O_START", "mazeSize": 20})).await;

    let state = next_state(&mut owner).await;
    assert_eq!(state["payload"]["full"], true);
    let snapshot = &state["payload"]["snapshot"];
    assert_eq!(snapshot["phase"], "countdown");
    assert_eq!(snapshot["mazeSize"], 20);
    assert_eq!(snapshot["maze"]["cells"].as_array().unwrap().len(), 400);
    assert_eq!(snapshot["owner"]["wallStock"], 48);
    assert_eq!(snapshot["player"]["score"], 0);

    // The player gets the same authoritative transition.
    let state = next_state(&mut player).await;
    assert_eq!(state["payload"]["snapshot"]["phase"], "countdown");
}

#[tokio::test]
async fn test_start_with_bad_size_is_rejected() {
    let (base, directory) = start_server().await;
    let room = directory.create_room().unwrap();

    let mut owner = connect(&base, room.as_str(), "owner", "BUILDER").await;
    next_state(&mut owner).await;
    let mut _player = connect(&base, room.as_str(), "player", "RUNNER").await;
    next_state(&mut owner).await; // session update

    send_json(&mut owner, json!({"type": "O_START", "mazeSize": 25})).await;

    let err = next_json(&mut owner).await;
    assert_eq!(err["type"], "ERR");
    assert_eq!(err["code"], "INVALID_ARG");
}

#[tokio::test]
async fn test_ping_pong_round_trip() {
    let (base, directory) = start_server().await;
    let room = directory.create_room().unwrap();

    let mut owner = connect(&base, room.as_str(), "owner", "BUILDER").await;
    next_state(&mut owner).await;

    send_json(&mut owner, json!({"type": "PING", "ts": 987654})).await;

    loop {
        let msg = next_json(&mut owner).await;
        if msg["type"] == "PONG" {
            assert_eq!(msg["ts"], 987654);
            break;
        }
    }
}

#[tokio::test]
async fn test_unparseable_frame_closes_connection() {
    let (base, directory) = start_server().await;
    let room = directory.create_room().unwrap();

    let mut owner = connect(&base, room.as_str(), "owner", "BUILDER").await;
    next_state(&mut owner).await;

    owner
        .send(Message::Text("this is not json".to_string().into()))
        .await
        .unwrap();

    let (code, reason) = next_close(&mut owner).await;
    assert_eq!(code, 4003);
    assert_eq!(reason, "invalid-handshake");
}

#[tokio::test]
async fn test_takeover_closes_displaced_connection() {
    let (base, directory) = start_server().await;
    let room = directory.create_room().unwrap();

    let mut first = connect(&base, room.as_str(), "owner", "BUILDER").await;
    next_state(&mut first).await;

    let mut second = connect(&base, room.as_str(), "owner", "BUILDER").await;
    next_state(&mut second).await;

    let (code, reason) = next_close(&mut first).await;
    assert_eq!(code, 4001);
    assert_eq!(reason, "takeover");
}
