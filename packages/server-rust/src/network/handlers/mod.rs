//! HTTP handler definitions for the `reqscope` demo service.
//!
//! This module defines `AppState` (the shared state carried through axum
//! extractors) and re-exports all handler functions for convenient access
//! when building the router.

pub mod context;
pub mod health;

pub use context::{attach_identity, context_handler, ROLE, USER};
pub use health::{health_handler, liveness_handler};

use std::sync::Arc;
use std::time::Instant;

use reqscope_core::RequestStore;

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Holds `Arc` references to shared resources so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Attribute store shared with the lifecycle layer.
    pub store: Arc<RequestStore>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Creates state over `store`, starting the uptime clock now.
    #[must_use]
    pub fn new(store: Arc<RequestStore>) -> Self {
        Self {
            store,
            start_time: Instant::now(),
        }
    }
}
