//! Transport abstraction layer for Gridlock.
//!
//! Provides the [`Transport`] and [`Connection`] traits that the server
//! facade consumes, plus the default WebSocket implementation. The game's
//! attach parameters (`room`, `role`, `nick`) ride the upgrade request's
//! query string, so a [`Connection`] exposes the request URI alongside
//! the frame stream.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// What a receive can yield besides end-of-stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// A data frame (text or binary payload bytes).
    Data(Vec<u8>),
    /// A pong answering one of our liveness pings.
    Pong(Vec<u8>),
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;
}

/// A single connection that can send and receive frames.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends a data frame to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Incoming>, Self::Error>;

    /// Sends a protocol-level ping carrying `payload`.
    async fn send_ping(&self, payload: &[u8]) -> Result<(), Self::Error>;

    /// Closes the connection with an application close code and reason.
    async fn close_with(&self, code: u16, reason: &str) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// The upgrade request's URI (path + query), for handshake parsing.
    fn request_uri(&self) -> &str;
}
