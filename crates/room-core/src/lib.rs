//! room-core: Shared types for room rendezvous and content synchronization.
//!
//! This crate provides:
//! - The `Members` snapshot exchanged between peers and the rendezvous service
//! - Wire constants and input validation shared by both sides of the protocol
//! - `PersonalId` and personal address resolution
//! - The `ContentStore` trait abstraction over the content-addressed storage engine

pub mod identity;
pub mod members;
pub mod protocol;
pub mod store;

pub use identity::PersonalId;
pub use members::Members;
pub use store::{ContentStore, InMemoryNetwork, InMemoryStore, StoreError};
