//! Session: one peer's view of a room.
//!
//! Owns the peer's identity, the id of the joined room and the last
//! membership snapshot, and sequences calls to the rendezvous service and
//! the storage engine. Operations are meant to be called one at a time; the
//! background sync run only reads session state.

use std::path::Path;
use std::sync::{Arc, RwLock};

use room_core::protocol::is_valid_room_id;
use room_core::{ContentStore, Members, PersonalId};
use tokio::fs;
use tracing::{debug, info};

use crate::client::RendezvousClient;
use crate::error::{Result, SessionError};

#[derive(Default)]
struct SessionState {
    personal_id: Option<PersonalId>,
    current_room: Option<String>,
    last_members: Option<Members>,
}

pub struct Session<S: ContentStore> {
    store: Arc<S>,
    client: RendezvousClient,
    state: RwLock<SessionState>,
}

impl<S: ContentStore> Session<S> {
    pub fn new(store: Arc<S>, client: RendezvousClient) -> Self {
        Self {
            store,
            client,
            state: RwLock::new(SessionState::default()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn client(&self) -> &RendezvousClient {
        &self.client
    }

    /// Fetch this node's identity from the storage engine.
    ///
    /// An identity without addresses means the engine is not reachable on
    /// the network yet.
    pub async fn refresh_identity(&self) -> Result<PersonalId> {
        let id = self.store.identity().await?;
        if id.addresses.is_empty() {
            return Err(SessionError::InvalidIdentity);
        }
        self.write_state().personal_id = Some(id.clone());
        Ok(id)
    }

    pub fn personal_id(&self) -> Option<PersonalId> {
        self.read_state().personal_id.clone()
    }

    pub fn current_room(&self) -> Option<String> {
        self.read_state().current_room.clone()
    }

    /// Membership snapshot from the last successful poll.
    pub fn last_members(&self) -> Option<Members> {
        self.read_state().last_members.clone()
    }

    /// First public IPv4 address of this node.
    pub fn resolve_personal_address(&self) -> Result<String> {
        let state = self.read_state();
        let id = state
            .personal_id
            .as_ref()
            .ok_or(SessionError::InvalidIdentity)?;
        id.personal_address()
            .map(str::to_string)
            .ok_or(SessionError::NoAddress)
    }

    /// Create a room on the rendezvous service.
    ///
    /// The creator is not a member until it calls `join_room`.
    pub async fn create_room(&self) -> Result<String> {
        let addr = self.resolve_personal_address()?;
        let room_id = self.client.create_room(&addr).await?;
        if !is_valid_room_id(&room_id) {
            return Err(SessionError::UnexpectedReply(room_id));
        }
        info!("Created room {}", room_id);
        Ok(room_id)
    }

    /// Join `room_id` and make it the session's current room.
    pub async fn join_room(&self, room_id: &str) -> Result<()> {
        if !is_valid_room_id(room_id) {
            return Err(SessionError::InvalidRoom(room_id.to_string()));
        }

        let id = self.refresh_identity().await?;
        let addr = self.resolve_personal_address()?;
        self.client.join_room(room_id, &id.id, &addr).await?;

        self.write_state().current_room = Some(room_id.to_string());
        info!("Joined room {} as {}", room_id, id.id);
        Ok(())
    }

    /// Refresh the membership snapshot and point the storage engine at the
    /// other members.
    ///
    /// The previous snapshot is discarded, not merged. The engine's bootstrap
    /// list is replaced by every member address except our own.
    pub async fn poll_members(&self) -> Result<Members> {
        let room_id = self.current_room().ok_or(SessionError::NotJoined)?;
        let own_id = self
            .personal_id()
            .ok_or(SessionError::InvalidIdentity)?
            .id;

        let members = self.client.members(&room_id).await?;
        self.write_state().last_members = Some(members.clone());

        let bootstrap = members.bootstrap_addresses(&own_id);
        for addr in &bootstrap {
            debug!("Peer added {}", addr);
        }
        self.store.set_bootstrap_peers(&bootstrap).await?;

        Ok(members)
    }

    /// Replace the contents of `path` with what the room's host published.
    pub async fn sync_from_host(&self, path: &Path) -> Result<()> {
        let members = self.last_members().ok_or(SessionError::NoMembers)?;
        if members.host_peer_id.is_empty() {
            return Err(SessionError::NoMembers);
        }
        self.fetch_into(path, &members.host_peer_id).await
    }

    /// Replace the contents of `path` with what `peer_id` published.
    pub async fn sync_from_peer(&self, path: &Path, peer_id: &str) -> Result<()> {
        if self.last_members().is_none() {
            return Err(SessionError::NoMembers);
        }
        self.fetch_into(path, peer_id).await
    }

    async fn fetch_into(&self, path: &Path, peer_id: &str) -> Result<()> {
        clear_directory(path).await?;
        self.store.fetch_by_name(peer_id, path).await?;
        info!("Synced {} from {}", path.display(), peer_id);
        Ok(())
    }

    /// Publish `path` and tell the room there is new content.
    pub async fn upload(&self, path: &Path) -> Result<()> {
        if self.last_members().is_none() {
            return Err(SessionError::NoMembers);
        }

        let name = self.store.publish(path).await?;
        debug!("Published {} as {}", path.display(), name);

        let addr = self.resolve_personal_address()?;
        let room_id = self.current_room().ok_or(SessionError::NotJoined)?;
        self.client.notify_update(&room_id, &addr).await?;

        info!("Uploaded {} to room {}", path.display(), room_id);
        Ok(())
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Remove everything inside `path`, keeping the directory itself.
async fn clear_directory(path: &Path) -> std::io::Result<()> {
    let mut entries = fs::read_dir(path).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            fs::remove_dir_all(entry.path()).await?;
        } else {
            fs::remove_file(entry.path()).await?;
        }
    }
    Ok(())
}
