//! Shard selection for request identities.
//!
//! Attribute tables are spread over a fixed number of independently locked
//! shards so that concurrent requests rarely contend on the same lock. This
//! module provides:
//!
//! - [`DEFAULT_SHARD_COUNT`]: The shard count used by the global store (128)
//! - [`shard_index`]: Maps a [`RequestId`] to a shard index in `[0, count)`
//! - [`ShardSelector`]: A validated shard count with the same mapping

use crate::error::StoreError;
use crate::hash::fnv1a_hash_u64;
use crate::identity::RequestId;

/// Number of shards in the default store.
pub const DEFAULT_SHARD_COUNT: usize = 128;

// ---------------------------------------------------------------------------
// shard_index
// ---------------------------------------------------------------------------

/// Computes the shard index for a request identity.
///
/// Deterministic and lock-free: the same identity always lands on the same
/// shard for a given `shard_count`.
///
/// # Panics
///
/// Panics if `shard_count` is zero. [`ShardSelector`] rules that out at
/// construction.
///
/// # Examples
///
/// ```
/// use reqscope_core::shard::shard_index;
/// use reqscope_core::RequestId;
///
/// let id = RequestId::from_raw(42);
/// assert_eq!(shard_index(id, 128), shard_index(id, 128));
/// assert!(shard_index(id, 7) < 7);
/// ```
#[must_use]
pub fn shard_index(id: RequestId, shard_count: usize) -> usize {
    assert!(shard_count > 0, "shard_count must be at least 1");
    // u32 -> usize is lossless on every supported target.
    fnv1a_hash_u64(id.as_u64()) as usize % shard_count
}

// ---------------------------------------------------------------------------
// ShardSelector
// ---------------------------------------------------------------------------

/// Validated shard count plus the identity-to-shard mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardSelector {
    count: usize,
}

impl ShardSelector {
    /// Creates a selector over `count` shards.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidShardCount`] if `count` is zero.
    pub fn new(count: usize) -> Result<Self, StoreError> {
        if count == 0 {
            return Err(StoreError::InvalidShardCount { count });
        }
        Ok(Self { count })
    }

    /// Total shard count.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Shard index for `id`.
    #[must_use]
    pub fn select(&self, id: RequestId) -> usize {
        shard_index(id, self.count)
    }
}

impl Default for ShardSelector {
    fn default() -> Self {
        Self {
            count: DEFAULT_SHARD_COUNT,
        }
    }
}
