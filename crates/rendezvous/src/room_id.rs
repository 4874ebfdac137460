//! Room id generation.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use sha2::{Digest, Sha256};

/// Generate a new room id: 32 lowercase hex chars.
///
/// 128 bits of a hash over the wall-clock nanosecond timestamp and a random
/// salt, so two rooms created in the same clock tick still differ.
pub fn generate_room_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let salt: u64 = rand::rng().random();

    let mut hasher = Sha256::new();
    hasher.update(nanos.to_string().as_bytes());
    hasher.update(salt.to_le_bytes());
    let digest = hasher.finalize();

    hex::encode(&digest[..16])
}

#[cfg(test)]
mod tests {
    use super::*;
    use room_core::protocol::{is_valid_room_id, ROOM_ID_LEN};
    use std::collections::HashSet;

    #[test]
    fn test_format() {
        let id = generate_room_id();
        assert_eq!(id.len(), ROOM_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        assert!(is_valid_room_id(&id));
    }

    #[test]
    fn test_unique_in_tight_loop() {
        let ids: HashSet<String> = (0..1000).map(|_| generate_room_id()).collect();
        assert_eq!(ids.len(), 1000);
    }
}
