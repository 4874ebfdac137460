//! Wire constants and request validation for the room API.
//!
//! The length checks are heuristics: a real room id is 32 hex chars and a real
//! peer address is a full multiaddr (`/ip4/…/tcp/…/p2p/…`), so anything much
//! shorter is rejected before the membership store is touched.

/// Base path of the room API.
pub const ROOM_API_PATH: &str = "/v1/room";

/// Header carrying the caller's claimed network address.
pub const ROOM_SYNC_HEADER: &str = "Room-sync-id";

/// Body returned by join and notify on success.
pub const OK_REPLY: &str = "ok";

pub const MIN_ROOM_ID_LEN: usize = 10;
pub const MIN_ADDRESS_LEN: usize = 70;
pub const MIN_PEER_ID_LEN: usize = 10;

/// Length of a generated room id (128-bit hash as lowercase hex).
pub const ROOM_ID_LEN: usize = 32;

pub fn is_valid_room_id(id: &str) -> bool {
    id.len() >= MIN_ROOM_ID_LEN
}

pub fn is_valid_address(addr: &str) -> bool {
    addr.len() >= MIN_ADDRESS_LEN
}

pub fn is_valid_peer_id(peer_id: &str) -> bool {
    peer_id.len() >= MIN_PEER_ID_LEN
}

/// Path for fetching members of, or notifying, a room.
pub fn room_path(room_id: &str) -> String {
    format!("{}/{}", ROOM_API_PATH, room_id)
}

/// Path for joining a room as `peer_id`.
pub fn join_path(room_id: &str, peer_id: &str) -> String {
    format!("{}/{}/{}", ROOM_API_PATH, room_id, peer_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_id_threshold() {
        assert!(!is_valid_room_id("123456789"));
        assert!(is_valid_room_id("1234567890"));
        assert!(is_valid_room_id(&"a".repeat(ROOM_ID_LEN)));
    }

    #[test]
    fn test_address_threshold() {
        assert!(!is_valid_address("/ip4/10.0.0.1/tcp/4001"));
        assert!(is_valid_address(&"x".repeat(MIN_ADDRESS_LEN)));
    }

    #[test]
    fn test_peer_id_threshold() {
        assert!(!is_valid_peer_id("QmShort"));
        assert!(is_valid_peer_id("QmYyQSo1c1Ym7orWxLYvCrM2EmxFTANf8wXmmE7DWjhx5N"));
    }

    #[test]
    fn test_paths() {
        assert_eq!(room_path("abc"), "/v1/room/abc");
        assert_eq!(join_path("abc", "peer"), "/v1/room/abc/peer");
    }
}
