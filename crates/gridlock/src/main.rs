//! Server entry point.

use gridlock::{GridlockError, GridlockServer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), GridlockError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let ws_addr = std::env::var("GRIDLOCK_WS_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into());
    let http_addr = std::env::var("GRIDLOCK_HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:8081".into());

    let server = GridlockServer::builder()
        .bind_ws(&ws_addr)
        .bind_http(&http_addr)
        .build()
        .await?;

    server.run().await
}
