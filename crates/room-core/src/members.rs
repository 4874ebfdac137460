//! Members: the membership snapshot of one room.
//!
//! This is both the record guarded by the rendezvous service and the JSON
//! document peers poll. Nodes are kept in a sorted map so two snapshots of
//! the same membership encode to identical bytes.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Membership of one room.
///
/// Serialized as `{"room", "host_addr", "host_id", "nodes": {address: peerId}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Members {
    #[serde(rename = "room", default)]
    pub room_id: String,
    /// Address of the first node that joined
    #[serde(default)]
    pub host_addr: String,
    /// Peer ID of the first node that joined
    #[serde(rename = "host_id", default)]
    pub host_peer_id: String,
    /// Address → peer ID
    #[serde(default, deserialize_with = "null_as_default")]
    pub nodes: BTreeMap<String, String>,
}

impl Members {
    /// Create an empty membership record for a room.
    pub fn new(room_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            ..Default::default()
        }
    }

    /// Record a join.
    ///
    /// The first node to arrive in an empty room becomes the host; the host
    /// is never reassigned afterwards, even if it leaves. Joining again from
    /// the same address replaces the peer ID.
    pub fn join(&mut self, addr: &str, peer_id: &str) {
        if self.nodes.is_empty() && self.host_addr.is_empty() {
            self.host_addr = addr.to_string();
            self.host_peer_id = peer_id.to_string();
        }
        self.nodes.insert(addr.to_string(), peer_id.to_string());
    }

    /// Remove a node. No-op if absent.
    pub fn leave(&mut self, addr: &str) {
        self.nodes.remove(addr);
    }

    /// Peer ID registered for an address.
    pub fn peer_id_of(&self, addr: &str) -> Option<&str> {
        self.nodes.get(addr).map(String::as_str)
    }

    /// True when no node has joined.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every member address except those registered under `own_peer_id`.
    pub fn bootstrap_addresses(&self, own_peer_id: &str) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|(_, peer_id)| peer_id.as_str() != own_peer_id)
            .map(|(addr, _)| addr.clone())
            .collect()
    }
}

/// Treat an explicit JSON `null` like a missing field.
pub(crate) fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}
