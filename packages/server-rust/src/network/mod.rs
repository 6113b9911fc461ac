//! HTTP integration: lifecycle middleware, extractor, handlers, and the server module.

pub mod clear;
pub mod config;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod module;

pub use clear::{ClearLayer, ClearService};
pub use config::NetworkConfig;
pub use extract::{RequestScope, ScopeRejection};
pub use handlers::AppState;
pub use middleware::build_http_layers;
pub use module::ScopeServer;
