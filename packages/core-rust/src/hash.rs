//! FNV-1a hash utilities for shard routing.
//!
//! Request identities are small integers minted from a counter, so they are
//! mixed through a 32-bit FNV-1a pass before the shard modulo. Raw ids that
//! share low-bit patterns (for example values aligned to 8 or 16) would
//! otherwise pile up on a handful of shards.

/// FNV-1a offset basis (32-bit).
const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;

/// FNV-1a prime (32-bit).
const FNV_PRIME: u32 = 0x0100_0193;

/// Computes a 32-bit FNV-1a hash over a byte slice.
///
/// # Examples
///
/// ```
/// use reqscope_core::hash::fnv1a_hash;
///
/// assert_eq!(fnv1a_hash(b""), 2_166_136_261); // FNV offset basis
/// assert_eq!(fnv1a_hash(b"a"), 0xe40c_292c);
/// ```
#[must_use]
pub fn fnv1a_hash(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in bytes {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Hashes a `u64` by its little-endian byte representation.
///
/// The byte order is fixed so the same identity lands on the same shard on
/// every platform.
#[must_use]
pub fn fnv1a_hash_u64(value: u64) -> u32 {
    fnv1a_hash(&value.to_le_bytes())
}
