//! Error kinds for the room API and the server lifecycle.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Request rejection, rendered as a status code plus a plain-text reason.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid room")]
    InvalidRoom,

    #[error("invalid personal address {0}")]
    InvalidAddress(String),

    #[error("invalid peer id")]
    InvalidPeer,

    #[error("room not found")]
    RoomNotFound,

    #[error("room is inaccessible")]
    RoomInaccessible,

    #[error("update rejected")]
    UpdateRejected,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::RoomNotFound => StatusCode::NOT_FOUND,
            ApiError::RoomInaccessible => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::InvalidRoom
            | ApiError::InvalidAddress(_)
            | ApiError::InvalidPeer
            | ApiError::UpdateRejected => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("sync in progress")]
    SyncInProgress,

    #[error("sync still in progress after {0:?}")]
    ShutdownTimedOut(Duration),

    #[error("server already stopped")]
    AlreadyStopped,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
