//! Server configuration and background services.
//!
//! 1. **Configuration** (`config`): network, store sizing, sweeper settings
//! 2. **Background workers** (`worker`): generic task + tick loop
//! 3. **Sweeper** (`sweeper`): periodic purge of stale attribute tables

pub mod config;
pub mod sweeper;
pub mod worker;

pub use config::{ConfigError, ServerConfig, StoreConfig, SweeperConfig};
pub use sweeper::{spawn_sweeper, StaleSweeper, SweepTask, PURGED_COUNTER};
pub use worker::{BackgroundRunnable, BackgroundWorker};
