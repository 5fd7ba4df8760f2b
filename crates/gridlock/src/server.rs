//! `GridlockServer` builder and server loop.
//!
//! Ties the layers together: two listeners (WebSocket game port, HTTP
//! room-creation port) over one shared [`RoomDirectory`]. Each accepted
//! socket gets its own handler task; each created room gets its own
//! actor task; a sweeper task evicts idle rooms.

use std::sync::Arc;
use std::time::Duration;

use gridlock_maze::{KruskalFactory, MazeFactory};
use gridlock_room::{RoomConfig, RoomDirectory};
use gridlock_transport::{Transport, WebSocketTransport};
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::handler::handle_connection;
use crate::{GridlockError, http};

/// How often the directory sweeps for idle or dead rooms.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Builder for configuring and starting a Gridlock server.
///
/// # Example
///
/// ```rust,no_run
/// use gridlock::GridlockServer;
///
/// # async fn run() -> Result<(), gridlock::GridlockError> {
/// let server = GridlockServer::builder()
///     .bind_ws("0.0.0.0:8080")
///     .bind_http("0.0.0.0:8081")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct GridlockServerBuilder {
    ws_addr: String,
    http_addr: String,
    room_config: RoomConfig,
    factory: Arc<dyn MazeFactory>,
}

impl GridlockServerBuilder {
    pub fn new() -> Self {
        Self {
            ws_addr: "127.0.0.1:8080".to_string(),
            http_addr: "127.0.0.1:8081".to_string(),
            room_config: RoomConfig::default(),
            factory: Arc::new(KruskalFactory),
        }
    }

    /// Address for the WebSocket game endpoint (`/ws`).
    pub fn bind_ws(mut self, addr: &str) -> Self {
        self.ws_addr = addr.to_string();
        self
    }

    /// Address for the HTTP endpoint (`POST /rooms`).
    pub fn bind_http(mut self, addr: &str) -> Self {
        self.http_addr = addr.to_string();
        self
    }

    /// Per-room configuration.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Swap the maze generator (tests use fixed layouts).
    pub fn maze_factory(mut self, factory: Arc<dyn MazeFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Binds both listeners and assembles the server.
    pub async fn build(self) -> Result<GridlockServer, GridlockError> {
        let transport = WebSocketTransport::bind(&self.ws_addr).await?;
        let http_listener = TcpListener::bind(&self.http_addr).await?;
        info!(addr = %self.http_addr, "HTTP listener bound");

        let directory = Arc::new(RoomDirectory::new(self.room_config.clone(), self.factory));

        Ok(GridlockServer {
            transport,
            http_listener,
            directory,
            room_config: self.room_config,
        })
    }
}

impl Default for GridlockServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Gridlock server.
pub struct GridlockServer {
    transport: WebSocketTransport,
    http_listener: TcpListener,
    directory: Arc<RoomDirectory>,
    room_config: RoomConfig,
}

impl GridlockServer {
    pub fn builder() -> GridlockServerBuilder {
        GridlockServerBuilder::new()
    }

    /// The bound WebSocket address.
    pub fn ws_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The bound HTTP address.
    pub fn http_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.http_listener.local_addr()
    }

    /// The shared room directory (handed to embedding code and tests).
    pub fn directory(&self) -> Arc<RoomDirectory> {
        Arc::clone(&self.directory)
    }

    /// Runs the accept loops until the process terminates.
    pub async fn run(mut self) -> Result<(), GridlockError> {
        info!("gridlock server running");

        let _sweeper = self.directory.spawn_sweeper(SWEEP_INTERVAL);

        let router = http::router(Arc::clone(&self.directory));
        let http_listener = self.http_listener;
        tokio::spawn(async move {
            if let Err(e) = axum::serve(http_listener, router).await {
                error!(error = %e, "http server stopped");
            }
        });

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let directory = Arc::clone(&self.directory);
                    let session_config = self.room_config.session.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, directory, session_config).await {
                            debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "accept failed");
                }
            }
        }
    }
}
