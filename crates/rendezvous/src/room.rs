//! Membership store: one lock per room, no lock shared between rooms.

use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use room_core::Members;

use crate::room_id::generate_room_id;

/// A room's membership behind a read/write lock.
///
/// Writers (join/leave) are totally ordered; snapshots never observe a
/// half-applied join.
pub struct Room {
    members: RwLock<Members>,
}

impl Room {
    pub fn new(room_id: &str) -> Self {
        Self {
            members: RwLock::new(Members::new(room_id)),
        }
    }

    /// Add or refresh a node. The first node to join becomes the host.
    pub fn join(&self, addr: &str, peer_id: &str) {
        let mut members = self.members.write().unwrap_or_else(|e| e.into_inner());
        members.join(addr, peer_id);
    }

    /// Remove a node. No-op if absent.
    pub fn leave(&self, addr: &str) {
        let mut members = self.members.write().unwrap_or_else(|e| e.into_inner());
        members.leave(addr);
    }

    /// Peer ID registered under `addr`.
    pub fn lookup(&self, addr: &str) -> Option<String> {
        let members = self.members.read().unwrap_or_else(|e| e.into_inner());
        members.peer_id_of(addr).map(str::to_string)
    }

    /// JSON encoding of the full membership record.
    pub fn snapshot(&self) -> serde_json::Result<Vec<u8>> {
        let members = self.members.read().unwrap_or_else(|e| e.into_inner());
        serde_json::to_vec(&*members)
    }

    /// Owned copy of the membership record.
    pub fn members(&self) -> Members {
        self.members
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Concurrent map from room id to room.
///
/// Operations on distinct rooms never contend on a shared lock beyond the
/// map's internal sharding.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, Arc<Room>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty room under a freshly generated id.
    ///
    /// An id collision silently replaces the existing room.
    pub fn create_room(&self) -> String {
        let room_id = generate_room_id();
        self.insert(&room_id, Room::new(&room_id));
        room_id
    }

    pub fn insert(&self, room_id: &str, room: Room) {
        self.rooms.insert(room_id.to_string(), Arc::new(room));
    }

    pub fn get(&self, room_id: &str) -> Option<Arc<Room>> {
        self.rooms.get(room_id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, room_id: &str) -> Option<Arc<Room>> {
        self.rooms.remove(room_id).map(|(_, room)| room)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn addr(n: usize) -> String {
        format!("/ip4/10.0.0.{}/tcp/4001/p2p/QmYyQSo1c1Ym7orWxLYvCrM2EmxFTANf8wXmmE7DWjhx{:02}", n, n)
    }

    #[test]
    fn test_create_and_get() {
        let registry = RoomRegistry::new();
        let id = registry.create_room();

        let room = registry.get(&id).expect("room should exist");
        assert_eq!(room.members().room_id, id);
        assert!(room.members().is_empty());
        assert!(registry.get("missing-room-id").is_none());
    }

    #[test]
    fn test_lookup() {
        let room = Room::new("room-0000001");
        room.join(&addr(1), "peer-1");

        assert_eq!(room.lookup(&addr(1)).as_deref(), Some("peer-1"));
        assert_eq!(room.lookup(&addr(2)), None);

        room.leave(&addr(1));
        assert_eq!(room.lookup(&addr(1)), None);
    }

    #[test]
    fn test_host_fixed_under_concurrent_joins() {
        let room = Arc::new(Room::new("room-0000001"));
        room.join(&addr(0), "host-peer");

        let handles: Vec<_> = (1..32)
            .map(|n| {
                let room = room.clone();
                thread::spawn(move || room.join(&addr(n), &format!("peer-{}", n)))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let members = room.members();
        assert_eq!(members.host_addr, addr(0));
        assert_eq!(members.host_peer_id, "host-peer");
        assert_eq!(members.nodes.len(), 32);
    }

    #[test]
    fn test_concurrent_joins_into_empty_room_pick_one_host() {
        let room = Arc::new(Room::new("room-0000001"));

        let handles: Vec<_> = (0..16)
            .map(|n| {
                let room = room.clone();
                thread::spawn(move || room.join(&addr(n), &format!("peer-{}", n)))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let members = room.members();
        assert_eq!(members.nodes.len(), 16);
        assert_eq!(
            members.peer_id_of(&members.host_addr),
            Some(members.host_peer_id.as_str())
        );
    }

    #[test]
    fn test_snapshot_is_consistent_during_joins() {
        let room = Arc::new(Room::new("room-0000001"));
        let writer = {
            let room = room.clone();
            thread::spawn(move || {
                for n in 0..200 {
                    room.join(&addr(n % 50), &format!("peer-{}", n % 50));
                }
            })
        };

        for _ in 0..200 {
            let data = room.snapshot().unwrap();
            let members: Members = serde_json::from_slice(&data).unwrap();
            if !members.is_empty() {
                // Host is recorded in the same critical section as the first node
                assert_eq!(members.host_addr, addr(0));
                assert_eq!(members.host_peer_id, "peer-0");
            }
        }
        writer.join().unwrap();
    }

    #[test]
    fn test_registry_rooms_are_independent() {
        let registry = Arc::new(RoomRegistry::new());
        let ids: Vec<String> = (0..8).map(|_| registry.create_room()).collect();

        let handles: Vec<_> = ids
            .iter()
            .cloned()
            .map(|id| {
                let registry = registry.clone();
                thread::spawn(move || {
                    let room = registry.get(&id).unwrap();
                    for n in 0..10 {
                        room.join(&addr(n), &format!("{}-{}", id, n));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 8);
        for id in &ids {
            let members = registry.get(id).unwrap().members();
            assert_eq!(members.nodes.len(), 10);
            assert_eq!(members.host_peer_id, format!("{}-0", id));
        }
    }
}
