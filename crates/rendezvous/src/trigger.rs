//! Single-flight synchronization trigger.
//!
//! A notification that a peer has published new content starts at most one
//! background synchronization run service-wide. A trigger that arrives while
//! a run is active is rejected, not queued. The run's outcome is only logged;
//! success and failure both return the trigger to `Idle`. Once closed, the
//! trigger refuses every later notification.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::error::ServerError;

/// Work performed by one synchronization run.
#[async_trait]
pub trait SyncJob: Send + Sync + 'static {
    /// Pull the content `peer_id` published and republish the merged result.
    async fn run(&self, peer_id: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Idle,
    Running,
    Closed,
}

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const CLOSED: u8 = 2;

/// Resets the trigger when a run ends, including by panic.
struct RunGuard(Arc<AtomicU8>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(IDLE, Ordering::Release);
    }
}

pub struct SyncTrigger {
    state: Arc<AtomicU8>,
    job: Option<Arc<dyn SyncJob>>,
}

impl SyncTrigger {
    pub fn new(job: Arc<dyn SyncJob>) -> Self {
        Self {
            state: Arc::new(AtomicU8::new(IDLE)),
            job: Some(job),
        }
    }

    /// A trigger with no local content engine behind it; rejects everything.
    pub fn disabled() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(IDLE)),
            job: None,
        }
    }

    pub fn state(&self) -> TriggerState {
        match self.state.load(Ordering::Acquire) {
            RUNNING => TriggerState::Running,
            CLOSED => TriggerState::Closed,
            _ => TriggerState::Idle,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == TriggerState::Running
    }

    /// Start a background run syncing from `peer_id`.
    ///
    /// Returns `true` if the run was started, `false` if one is already
    /// active or the trigger is disabled or closed. Never waits for the run itself.
    /// Must be called from within a Tokio runtime.
    pub fn trigger(&self, peer_id: &str) -> bool {
        let Some(job) = self.job.clone() else {
            debug!("Sync trigger disabled, ignoring update from {}", peer_id);
            return false;
        };

        match self
            .state
            .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {}
            Err(CLOSED) => {
                debug!("Sync trigger closed, rejecting update from {}", peer_id);
                return false;
            }
            Err(_) => {
                debug!("Sync already in progress, rejecting update from {}", peer_id);
                return false;
            }
        }

        let guard = RunGuard(self.state.clone());
        let peer_id = peer_id.to_string();
        tokio::spawn(async move {
            let _guard = guard;
            info!("Sync from {} started", peer_id);
            match job.run(&peer_id).await {
                Ok(()) => info!("Sync from {} finished", peer_id),
                Err(e) => error!("Sync from {} failed: {:#}", peer_id, e),
            }
        });

        true
    }

    /// Refuse all further triggers.
    ///
    /// Fails with `SyncInProgress` while a run is active. Closing twice is
    /// not an error.
    pub fn close(&self) -> Result<(), ServerError> {
        match self
            .state
            .compare_exchange(IDLE, CLOSED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) | Err(CLOSED) => Ok(()),
            Err(_) => Err(ServerError::SyncInProgress),
        }
    }
}
