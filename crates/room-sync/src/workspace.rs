//! The host's synchronization run: pull a peer's content into the working
//! directory, then republish it so every other member can fetch it.

use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use rendezvous::SyncJob;
use room_core::ContentStore;
use tracing::info;

use crate::session::Session;

pub struct WorkspaceSync<S: ContentStore> {
    session: Arc<Session<S>>,
    working_path: RwLock<Option<PathBuf>>,
    step_timeout: Duration,
}

impl<S: ContentStore> WorkspaceSync<S> {
    pub fn new(session: Arc<Session<S>>, step_timeout: Duration) -> Self {
        Self {
            session,
            working_path: RwLock::new(None),
            step_timeout,
        }
    }

    pub fn set_working_path(&self, path: PathBuf) {
        *self.working_path.write().unwrap_or_else(|e| e.into_inner()) = Some(path);
    }

    pub fn working_path(&self) -> Option<PathBuf> {
        self.working_path
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    async fn step<T, E>(&self, name: &str, fut: impl Future<Output = Result<T, E>>) -> anyhow::Result<T>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        tokio::time::timeout(self.step_timeout, fut)
            .await
            .map_err(|_| anyhow!("{} timed out after {:?}", name, self.step_timeout))?
            .with_context(|| format!("{} failed", name))
    }
}

#[async_trait]
impl<S: ContentStore + 'static> SyncJob for WorkspaceSync<S> {
    async fn run(&self, peer_id: &str) -> anyhow::Result<()> {
        let path = self
            .working_path()
            .ok_or_else(|| anyhow!("working directory not set"))?;

        self.step("fetch", self.session.sync_from_peer(&path, peer_id))
            .await?;
        let name = self
            .step("publish", self.session.store().publish(&path))
            .await?;

        info!("Republished {} as {}", path.display(), name);
        Ok(())
    }
}
