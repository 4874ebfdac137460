//! room-sync library: Exposes the peer-side components for the binary and tests.
//!
//! The session drives room create/join/poll/sync/upload against a rendezvous
//! service and a content-addressed storage engine.

pub mod client;
pub mod config;
pub mod error;
pub mod ipfs;
pub mod session;
pub mod shell;
pub mod workspace;

// Re-export key types for convenience
pub use client::RendezvousClient;
pub use config::Config;
pub use error::SessionError;
pub use ipfs::IpfsStore;
pub use session::Session;
pub use workspace::WorkspaceSync;
