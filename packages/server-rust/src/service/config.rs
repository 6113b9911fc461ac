//! Server-level configuration: network, store sizing, and the stale sweeper.

use std::time::Duration;

use reqscope_core::DEFAULT_SHARD_COUNT;

use crate::network::NetworkConfig;

/// Errors reported by [`ServerConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("shard count must be at least 1")]
    InvalidShardCount,
    #[error("sweeper interval must be non-zero when the sweeper is enabled")]
    ZeroSweepInterval,
}

/// Sizing of the attribute store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Number of independently locked shards. Defaults to
    /// `reqscope_core::DEFAULT_SHARD_COUNT` (128).
    pub shard_count: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            shard_count: DEFAULT_SHARD_COUNT,
        }
    }
}

/// Periodic removal of attribute tables whose request never cleared them.
///
/// Disabled by default: with the lifecycle layer installed every request
/// clears itself, and the sweeper only guards against code paths that bypass
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweeperConfig {
    /// Whether the server runs the sweeper at all.
    pub enabled: bool,
    /// Time between sweeps.
    pub interval: Duration,
    /// Tables older than this many seconds are purged. Zero or negative
    /// purges every table on each sweep.
    pub max_age_secs: i64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: Duration::from_secs(60),
            max_age_secs: 300,
        }
    }
}

/// Complete configuration for a [`ScopeServer`](crate::network::ScopeServer).
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Bind address, CORS and request timeout.
    pub network: NetworkConfig,
    /// Store sizing.
    pub store: StoreConfig,
    /// Stale table sweeper.
    pub sweeper: SweeperConfig,
}

impl ServerConfig {
    /// Checks values that would otherwise fail later at startup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidShardCount`] for a zero shard count and
    /// [`ConfigError::ZeroSweepInterval`] for an enabled sweeper with a zero
    /// interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.shard_count == 0 {
            return Err(ConfigError::InvalidShardCount);
        }
        if self.sweeper.enabled && self.sweeper.interval.is_zero() {
            return Err(ConfigError::ZeroSweepInterval);
        }
        Ok(())
    }
}
