//! Running the room API on a TCP listener.
//!
//! Shutdown is refused while a synchronization run is active. Callers either
//! retry `shutdown` themselves or use `shutdown_within` for a bounded wait.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info};

use crate::AppState;
use crate::api::router;
use crate::error::ServerError;
use crate::trigger::SyncTrigger;

/// Rendezvous API served in a background task.
pub struct RendezvousServer {
    local_addr: SocketAddr,
    trigger: Arc<SyncTrigger>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    handle: Mutex<Option<JoinHandle<std::io::Result<()>>>>,
}

impl RendezvousServer {
    /// Bind to `listen_addr` and start serving.
    pub async fn start(listen_addr: &str, state: Arc<AppState>) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(listen_addr).await?;
        Self::serve(listener, state)
    }

    /// Start serving on an already bound listener.
    ///
    /// Lets a caller learn the bound address before building the state.
    pub fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<Self, ServerError> {
        let local_addr = listener.local_addr()?;
        info!("Rendezvous service listening on {}", local_addr);

        let trigger = state.trigger.clone();
        let app = router(state);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        Ok(Self {
            local_addr,
            trigger,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting requests, unless a synchronization run is active.
    ///
    /// Never waits: returns `SyncInProgress` immediately if the trigger is busy.
    /// On success the trigger is closed, so requests still in flight cannot
    /// start a run.
    pub fn shutdown(&self) -> Result<(), ServerError> {
        self.trigger.close()?;

        let tx = self
            .shutdown_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or(ServerError::AlreadyStopped)?;
        let _ = tx.send(());
        info!("Rendezvous service stopping");
        Ok(())
    }

    /// Retry `shutdown` every `interval` until it succeeds or `deadline` passes.
    pub async fn shutdown_within(
        &self,
        deadline: Duration,
        interval: Duration,
    ) -> Result<(), ServerError> {
        let started = Instant::now();
        loop {
            match self.shutdown() {
                Err(ServerError::SyncInProgress) => {
                    if started.elapsed().saturating_add(interval) > deadline {
                        return Err(ServerError::ShutdownTimedOut(deadline));
                    }
                    info!("Awaiting for the synchronization to end...");
                    tokio::time::sleep(interval).await;
                }
                result => return result,
            }
        }
    }

    /// Wait for the serving task to finish after a shutdown.
    pub async fn stopped(&self) -> Result<(), ServerError> {
        let handle = self.handle.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(handle) = handle else {
            return Ok(());
        };
        match handle.await {
            Ok(result) => result.map_err(ServerError::from),
            Err(e) => {
                error!("Rendezvous task ended abnormally: {}", e);
                Ok(())
            }
        }
    }
}
