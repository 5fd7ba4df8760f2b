//! The HTTP surface: room creation.
//!
//! One endpoint, `POST /rooms`, allocating a code for the WebSocket
//! attach. Served by axum on its own listener next to the game port.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use gridlock_protocol::RoomCode;
use gridlock_room::RoomDirectory;
use serde::Serialize;
use tracing::error;

/// Body of a successful `POST /rooms`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponse {
    pub room_id: RoomCode,
}

/// Builds the HTTP router.
pub fn router(directory: Arc<RoomDirectory>) -> Router {
    Router::new()
        .route("/rooms", post(create_room))
        .with_state(directory)
}

async fn create_room(
    State(directory): State<Arc<RoomDirectory>>,
) -> Result<(StatusCode, Json<CreateRoomResponse>), StatusCode> {
    match directory.create_room() {
        Ok(code) => Ok((StatusCode::CREATED, Json(CreateRoomResponse { room_id: code }))),
        Err(e) => {
            error!(error = %e, "room allocation failed");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
