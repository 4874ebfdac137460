//! rendezvous: HTTP service where peers create, join and query rooms.
//!
//! Provides:
//! - The membership store (`Room`, `RoomRegistry`)
//! - The `/v1/room` API handlers
//! - The single-flight `SyncTrigger` that turns "peer has new content"
//!   notifications into background synchronization runs
//! - `RendezvousServer` for running the API with a bounded shutdown

pub mod api;
pub mod error;
pub mod room;
pub mod room_id;
pub mod server;
pub mod trigger;

use std::sync::Arc;

pub use api::router;
pub use error::{ApiError, ServerError};
pub use room::{Room, RoomRegistry};
pub use server::RendezvousServer;
pub use trigger::{SyncJob, SyncTrigger, TriggerState};

/// Shared application state
pub struct AppState {
    pub rooms: RoomRegistry,
    pub trigger: Arc<SyncTrigger>,
}

impl AppState {
    pub fn new(trigger: Arc<SyncTrigger>) -> Self {
        Self {
            rooms: RoomRegistry::new(),
            trigger,
        }
    }
}
