//! HTTP and WebSocket routes.

use axum::{
    extract::{ws::WebSocketUpgrade, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use drawboard_core::Snapshot;
use serde::Serialize;
use serde_json::json;

use crate::connection::handle_socket;
use crate::health;
use crate::room::{RoomError, RoomHandle, RoomStats};
use crate::validation::validate_room_id;
use crate::AppState;

/// Errors returned by the HTTP API.
#[derive(Debug)]
pub enum ApiError {
    /// The room does not exist.
    NotFound(String),
    /// The request is malformed.
    BadRequest(String),
    /// The room worker did not answer.
    Unavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<RoomError> for ApiError {
    fn from(err: RoomError) -> Self {
        match err {
            RoomError::Validation(e) => Self::BadRequest(e.to_string()),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

/// Response body of `GET /api/rooms`.
#[derive(Debug, Serialize)]
pub struct RoomList {
    /// Room IDs, sorted.
    pub rooms: Vec<String>,
    /// Room limit.
    pub max_rooms: usize,
}

/// Response body of `GET /api/rooms/{room_id}/snapshot`.
#[derive(Debug, Serialize)]
pub struct RoomSnapshot {
    /// Room ID.
    pub room_id: String,
    /// Canvas state.
    #[serde(flatten)]
    pub snapshot: Snapshot,
}

/// Build the application router.
///
/// Metrics and tower layers are added by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/health", get(health::readiness))
        .route("/ws", get(websocket_handler))
        .route("/api/rooms", get(list_rooms))
        .route("/api/rooms/{room_id}/snapshot", get(room_snapshot))
        .route("/api/rooms/{room_id}/stats", get(room_stats))
        .with_state(state)
}

/// WebSocket upgrade for canvas sessions.
#[tracing::instrument(name = "websocket_connect", skip(ws, state))]
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    tracing::info!("WebSocket connection upgrade requested");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// List rooms.
pub async fn list_rooms(State(state): State<AppState>) -> Json<RoomList> {
    Json(RoomList {
        rooms: state.rooms.ids(),
        max_rooms: state.rooms.max_rooms(),
    })
}

/// Current canvas state of a room.
#[tracing::instrument(skip(state))]
pub async fn room_snapshot(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomSnapshot>, ApiError> {
    let room = existing_room(&state, &room_id)?;
    let snapshot = room.snapshot().await?;
    Ok(Json(RoomSnapshot { room_id, snapshot }))
}

/// History statistics of a room.
#[tracing::instrument(skip(state))]
pub async fn room_stats(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomStats>, ApiError> {
    let room = existing_room(&state, &room_id)?;
    Ok(Json(room.stats().await?))
}

// Reads never create rooms.
fn existing_room(state: &AppState, room_id: &str) -> Result<RoomHandle, ApiError> {
    validate_room_id(room_id)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    state
        .rooms
        .get(room_id)
        .ok_or_else(|| ApiError::NotFound(format!("room {room_id} not found")))
}
