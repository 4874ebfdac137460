//! Standalone rendezvous service.
//!
//! Hosts rooms for peers that run their own content engine elsewhere. With no
//! local engine attached, update notifications are always rejected; peers
//! that want to be synced from run `room-sync --create` instead.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rendezvous::{AppState, RendezvousServer, SyncTrigger};
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rendezvous")]
#[command(about = "Room rendezvous service for room-sync peers")]
struct Cli {
    /// Port to listen on
    #[arg(long, default_value_t = 3100, env = "RENDEZVOUS_PORT")]
    port: u16,

    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0", env = "RENDEZVOUS_BIND")]
    bind: String,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "debug,rendezvous=debug,tower_http=debug"
    } else {
        "info,rendezvous=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let state = Arc::new(AppState::new(Arc::new(SyncTrigger::disabled())));
    let listen = format!("{}:{}", cli.bind, cli.port);
    let server = RendezvousServer::start(&listen, state)
        .await
        .with_context(|| format!("Failed to start rendezvous service on {}", listen))?;

    signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;
    tracing::info!("Shutdown signal received");

    server.shutdown()?;
    server.stopped().await?;
    tracing::info!("Rendezvous service shut down");
    Ok(())
}
