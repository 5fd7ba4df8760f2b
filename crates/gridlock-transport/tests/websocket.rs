//! Integration tests for the WebSocket transport with a real client socket.

use futures_util::{SinkExt, StreamExt};
use gridlock_transport::{Connection, Incoming, Transport, WebSocketTransport};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Binds a transport on an ephemeral port and returns it with its URL.
async fn bound_transport() -> (WebSocketTransport, String) {
    let transport = WebSocketTransport::bind("127.0.0.1:0").await.unwrap();
    let addr = transport.local_addr().unwrap();
    (transport, format!("ws://{addr}"))
}

#[tokio::test]
async fn test_accept_captures_request_uri() {
    let (mut transport, url) = bound_transport().await;

    let client = tokio::spawn(async move {
        let (ws, _) = connect_async(format!("{url}/ws?room=AB23CD&role=owner&nick=BUILDER"))
            .await
            .unwrap();
        ws
    });

    let conn = transport.accept().await.unwrap();
    assert_eq!(conn.request_uri(), "/ws?room=AB23CD&role=owner&nick=BUILDER");

    client.await.unwrap();
}

#[tokio::test]
async fn test_text_frames_round_trip() {
    let (mut transport, url) = bound_transport().await;

    let client = tokio::spawn(async move {
        let (mut ws, _) = connect_async(format!("{url}/ws")).await.unwrap();
        ws.send(Message::Text(r#"{"type":"PING","ts":1}"#.to_string().into()))
            .await
            .unwrap();
        // Read the server's reply.
        let reply = ws.next().await.unwrap().unwrap();
        assert_eq!(reply.into_text().unwrap().as_str(), r#"{"type":"PONG","ts":1}"#);
    });

    let conn = transport.accept().await.unwrap();
    let frame = conn.recv().await.unwrap().unwrap();
    assert_eq!(
        frame,
        Incoming::Data(br#"{"type":"PING","ts":1}"#.to_vec())
    );

    conn.send(br#"{"type":"PONG","ts":1}"#).await.unwrap();
    client.await.unwrap();
}

#[tokio::test]
async fn test_ping_elicits_pong_frame() {
    let (mut transport, url) = bound_transport().await;

    let client = tokio::spawn(async move {
        let (mut ws, _) = connect_async(format!("{url}/ws")).await.unwrap();
        // tungstenite answers pings automatically while we poll the stream;
        // hold the socket open until the server is done.
        while let Some(Ok(msg)) = ws.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    let conn = transport.accept().await.unwrap();
    conn.send_ping(b"42").await.unwrap();

    let frame = conn.recv().await.unwrap().unwrap();
    assert_eq!(frame, Incoming::Pong(b"42".to_vec()));

    conn.close_with(1000, "").await.unwrap();
    client.await.unwrap();
}

#[tokio::test]
async fn test_close_with_delivers_code_and_reason() {
    let (mut transport, url) = bound_transport().await;

    let client = tokio::spawn(async move {
        let (mut ws, _) = connect_async(format!("{url}/ws")).await.unwrap();
        let msg = ws.next().await.unwrap().unwrap();
        let Message::Close(Some(frame)) = msg else {
            panic!("expected close frame, got {msg:?}");
        };
        assert_eq!(u16::from(frame.code), 4001);
        assert_eq!(frame.reason.as_str(), "takeover");
    });

    let conn = transport.accept().await.unwrap();
    conn.close_with(4001, "takeover").await.unwrap();

    client.await.unwrap();
}

#[tokio::test]
async fn test_client_close_yields_end_of_stream() {
    let (mut transport, url) = bound_transport().await;

    let client = tokio::spawn(async move {
        let (mut ws, _) = connect_async(format!("{url}/ws")).await.unwrap();
        ws.close(None).await.unwrap();
    });

    let conn = transport.accept().await.unwrap();
    let frame = conn.recv().await.unwrap();
    assert_eq!(frame, None);

    client.await.unwrap();
}
