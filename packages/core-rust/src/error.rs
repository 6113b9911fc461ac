/// Errors raised while constructing or addressing a [`RequestStore`](crate::RequestStore).
///
/// Attribute operations themselves never fail: absent requests and keys read
/// as `None` or empty.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("shard count must be at least 1, got {count}")]
    InvalidShardCount { count: usize },
    #[error("shard index {index} out of range [0, {count})")]
    ShardOutOfRange { index: usize, count: usize },
}
