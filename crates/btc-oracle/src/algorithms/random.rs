//! # Block Random Value
//!
//! Verifiable random number in `[1, 100000]` derived from a block hash.

use sha2::{Digest, Sha256};
use crate::domain::RANDOM_RANGE;

/// `floor(100000 * n / 2^32) + 1` where `n` is the big-endian `u32` formed by
/// the first four bytes of `SHA256(utf8(block_hash))`.
pub fn random_value(block_hash: &str) -> u32 {
    let digest = Sha256::digest(block_hash.as_bytes());
    let n = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    let scaled = (RANDOM_RANGE * u64::from(n)) >> 32;
    (scaled + 1) as u32
}
