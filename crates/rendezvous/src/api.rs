//! `/v1/room` handlers.
//!
//! | Method | Path              | Purpose                               |
//! |--------|-------------------|---------------------------------------|
//! | POST   | `/v1/room`        | create a room, body is the new id     |
//! | GET    | `/v1/room/{id}`   | members snapshot as JSON              |
//! | POST   | `/v1/room/{id}`   | caller published new content          |
//! | POST   | `/v1/room/{id}/{peer}` | join as `peer`                   |
//!
//! Join and notify read the caller's address from the `Room-sync-id` header.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use room_core::protocol::{
    OK_REPLY, ROOM_SYNC_HEADER, is_valid_address, is_valid_peer_id, is_valid_room_id,
};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, error, info};

use crate::AppState;
use crate::error::ApiError;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/room", post(create_room))
        .route("/v1/room/", post(create_room))
        .route("/v1/room/{id}", get(room_members).post(update_room))
        .route("/v1/room/{id}/{peer}", post(join_room))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Caller's claimed address, empty if the header is missing or not UTF-8.
fn claimed_address(headers: &HeaderMap) -> &str {
    headers
        .get(ROOM_SYNC_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// Handler for `POST /v1/room`
pub async fn create_room(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let room_id = state.rooms.create_room();
    info!("Created room {}", room_id);
    (StatusCode::OK, room_id)
}

/// Handler for `GET /v1/room/{id}`
pub async fn room_members(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    if !is_valid_room_id(&id) {
        return Err(ApiError::InvalidRoom);
    }

    let room = state.rooms.get(&id).ok_or(ApiError::RoomNotFound)?;
    let data = room.snapshot().map_err(|e| {
        error!("Failed to serialize members of {}: {}", id, e);
        ApiError::RoomInaccessible
    })?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        data,
    )
        .into_response())
}

/// Handler for `POST /v1/room/{id}`
///
/// Resolves the caller's address to its peer ID and asks the sync trigger to
/// pull from that peer. Rejected if the caller is not a member or a sync is
/// already running.
pub async fn update_room(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<&'static str, ApiError> {
    if !is_valid_room_id(&id) {
        return Err(ApiError::InvalidRoom);
    }
    let addr = claimed_address(&headers);
    if !is_valid_address(addr) {
        return Err(ApiError::InvalidAddress(addr.to_string()));
    }

    let peer_id = state
        .rooms
        .get(&id)
        .and_then(|room| room.lookup(addr))
        .ok_or_else(|| {
            debug!("Update for {} from non-member {}", id, addr);
            ApiError::UpdateRejected
        })?;

    if state.trigger.trigger(&peer_id) {
        Ok(OK_REPLY)
    } else {
        Err(ApiError::UpdateRejected)
    }
}

/// Handler for `POST /v1/room/{id}/{peer}`
pub async fn join_room(
    State(state): State<Arc<AppState>>,
    Path((id, peer_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<&'static str, ApiError> {
    if !is_valid_room_id(&id) {
        return Err(ApiError::InvalidRoom);
    }
    if !is_valid_peer_id(&peer_id) {
        return Err(ApiError::InvalidPeer);
    }
    let addr = claimed_address(&headers);
    if !is_valid_address(addr) {
        return Err(ApiError::InvalidAddress(addr.to_string()));
    }

    let room = state.rooms.get(&id).ok_or(ApiError::InvalidRoom)?;
    room.join(addr, &peer_id);
    info!("Peer {} joined room {} from {}", peer_id, id, addr);

    Ok(OK_REPLY)
}
