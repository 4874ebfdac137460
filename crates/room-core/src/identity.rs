//! PersonalId: the storage engine's view of this node.
//!
//! Field names follow the engine's `id` output (`ID`, `PublicKey`, ...).

use serde::{Deserialize, Serialize};

use crate::members::null_as_default;

/// Identity reported by the content-addressed storage engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalId {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "PublicKey", default)]
    pub public_key: String,
    /// Multiaddrs the engine listens on, in the order reported
    #[serde(rename = "Addresses", default, deserialize_with = "null_as_default")]
    pub addresses: Vec<String>,
    #[serde(rename = "AgentVersion", default)]
    pub agent_version: String,
    #[serde(rename = "ProtocolVersion", default)]
    pub protocol_version: String,
}

impl PersonalId {
    /// First address that is IPv4 and not loopback.
    ///
    /// No preference among several valid candidates: order wins.
    pub fn personal_address(&self) -> Option<&str> {
        self.addresses
            .iter()
            .map(String::as_str)
            .find(|addr| is_routable_ip4(addr))
    }
}

/// True for `/ip4/<host>/...` where host is neither `127.0.0.1` nor `localhost`.
pub fn is_routable_ip4(addr: &str) -> bool {
    let mut parts = addr.split('/');
    if parts.next() != Some("") || parts.next() != Some("ip4") {
        return false;
    }
    match parts.next() {
        Some(host) => !host.is_empty() && host != "127.0.0.1" && host != "localhost",
        None => false,
    }
}
