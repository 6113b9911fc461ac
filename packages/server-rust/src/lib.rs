//! `reqscope` server integration -- lifecycle wrapper, tower/axum middleware,
//! background sweeper, and a demo HTTP server.

pub mod lifecycle;
pub mod network;
pub mod service;

pub use lifecycle::{clear_handler, scoped, ClearGuard};
pub use network::{build_http_layers, ClearLayer, NetworkConfig, RequestScope, ScopeServer};
pub use service::{spawn_sweeper, ConfigError, ServerConfig, StoreConfig, SweeperConfig};
