//! Deterministic shard selection for round-robin distribution

use sha2::{Digest, Sha256};

/// Stable 64-bit hash of a string
///
/// The first eight bytes of its SHA-256 digest, so every process agrees on
/// it regardless of platform or run.
pub fn stable_hash(value: &str) -> u64 {
    let digest = Sha256::digest(value.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Shard a URL is routed to
///
/// `node_count` must be non-zero; the strategy constructor rejects zero.
pub fn shard_for(url: &str, node_count: u32) -> u32 {
    (stable_hash(url) % u64::from(node_count.max(1))) as u32
}

/// Shard a worker pops from
pub fn worker_shard(worker_number: u64, node_count: u32) -> u32 {
    (worker_number % u64::from(node_count.max(1))) as u32
}
