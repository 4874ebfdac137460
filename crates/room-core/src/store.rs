//! ContentStore trait abstraction over the content-addressed storage engine.
//!
//! Implementations:
//! - `InMemoryStore` - For testing
//! - `IpfsStore` (in room-sync) - Drives the `ipfs` and `ipget` binaries

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::debug;

use crate::identity::PersonalId;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Name not found: {0}")]
    NotFound(String),

    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Unexpected output: {0}")]
    UnexpectedOutput(String),

    #[error("Can't retrieve identity. Perhaps, daemon is not running")]
    InvalidIdentity,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Content-addressed storage engine, as seen by the session.
///
/// Content is published under a mutable name derived from the node's
/// identity (its peer ID), so other peers fetch "whatever peer X published
/// last" by that peer ID.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Identity of the local engine node.
    async fn identity(&self) -> Result<PersonalId>;

    /// Retrieve the content published under `name` into `dest`.
    async fn fetch_by_name(&self, name: &str, dest: &Path) -> Result<()>;

    /// Content-address the directory at `path` and announce it under this
    /// node's name. Returns the announced name.
    async fn publish(&self, path: &Path) -> Result<String>;

    /// Replace the engine's bootstrap peer list.
    async fn set_bootstrap_peers(&self, peers: &[String]) -> Result<()>;

    /// Start a background engine daemon owned by this process.
    async fn start_daemon(&self) -> Result<()>;

    /// Stop the daemon started by `start_daemon`. No-op if none is running.
    async fn stop_daemon(&self) -> Result<()>;
}

/// Relative path → file content.
type Snapshot = BTreeMap<PathBuf, Vec<u8>>;

/// Shared name table for a set of `InMemoryStore`s.
///
/// Stores created on the same network see each other's published content.
#[derive(Default)]
pub struct InMemoryNetwork {
    published: RwLock<HashMap<String, Snapshot>>,
}

impl InMemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Names that have content published under them.
    pub fn names(&self) -> Vec<String> {
        let published = self.published.read().unwrap_or_else(|e| e.into_inner());
        published.keys().cloned().collect()
    }

    /// Files published under `name`, as relative paths.
    pub fn files(&self, name: &str) -> Option<Vec<PathBuf>> {
        let published = self.published.read().unwrap_or_else(|e| e.into_inner());
        published.get(name).map(|s| s.keys().cloned().collect())
    }
}

/// In-memory engine for testing.
///
/// Filesystem access is blocking (`std::fs`); intended for small test trees.
pub struct InMemoryStore {
    identity: PersonalId,
    network: Arc<InMemoryNetwork>,
    bootstrap: RwLock<Vec<String>>,
    daemon_running: AtomicBool,
    fetches: AtomicUsize,
}

impl InMemoryStore {
    /// Create a store on its own private network.
    pub fn new(identity: PersonalId) -> Self {
        Self::with_network(identity, InMemoryNetwork::new())
    }

    /// Create a store that shares published names with other stores.
    pub fn with_network(identity: PersonalId, network: Arc<InMemoryNetwork>) -> Self {
        Self {
            identity,
            network,
            bootstrap: RwLock::new(Vec::new()),
            daemon_running: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn network(&self) -> &Arc<InMemoryNetwork> {
        &self.network
    }

    /// Current bootstrap peer list.
    pub fn bootstrap_peers(&self) -> Vec<String> {
        self.bootstrap
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of `fetch_by_name` calls so far, successful or not.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn is_daemon_running(&self) -> bool {
        self.daemon_running.load(Ordering::SeqCst)
    }
}

fn collect_files(root: &Path, dir: &Path, out: &mut Snapshot) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_files(root, &path, out)?;
        } else {
            let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
            out.insert(relative, std::fs::read(&path)?);
        }
    }
    Ok(())
}

#[async_trait]
impl ContentStore for InMemoryStore {
    async fn identity(&self) -> Result<PersonalId> {
        Ok(self.identity.clone())
    }

    async fn fetch_by_name(&self, name: &str, dest: &Path) -> Result<()> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let snapshot = {
            let published = self.network.published.read().unwrap_or_else(|e| e.into_inner());
            published
                .get(name)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(name.to_string()))?
        };

        for (relative, content) in snapshot {
            let target = dest.join(relative);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(target, content)?;
        }
        Ok(())
    }

    async fn publish(&self, path: &Path) -> Result<String> {
        if !path.exists() {
            return Err(StoreError::NotFound(path.display().to_string()));
        }

        let mut snapshot = Snapshot::new();
        collect_files(path, path, &mut snapshot)?;

        let name = self.identity.id.clone();
        debug!("Publishing {} file(s) under {}", snapshot.len(), name);
        let mut published = self.network.published.write().unwrap_or_else(|e| e.into_inner());
        published.insert(name.clone(), snapshot);
        Ok(name)
    }

    async fn set_bootstrap_peers(&self, peers: &[String]) -> Result<()> {
        *self.bootstrap.write().unwrap_or_else(|e| e.into_inner()) = peers.to_vec();
        Ok(())
    }

    async fn start_daemon(&self) -> Result<()> {
        self.daemon_running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_daemon(&self) -> Result<()> {
        self.daemon_running.store(false, Ordering::SeqCst);
        Ok(())
    }
}
