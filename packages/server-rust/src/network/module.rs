//! Server module with deferred startup lifecycle.
//!
//! Implements the deferred startup pattern: `new()` creates resources,
//! `start()` binds the TCP listener, and `serve()` starts accepting
//! connections. Between `new()` and `serve()` the store can be handed to
//! other components via [`ScopeServer::store`].

use std::future::Future;
use std::sync::Arc;

use axum::middleware::from_fn;
use axum::routing::get;
use axum::Router;
use reqscope_core::RequestStore;
use tokio::net::TcpListener;
use tracing::info;

use super::handlers::{attach_identity, context_handler, health_handler, liveness_handler, AppState};
use super::middleware::build_http_layers;
use crate::service::config::{ConfigError, ServerConfig};
use crate::service::sweeper::spawn_sweeper;

/// Manages the HTTP server lifecycle around one [`RequestStore`].
///
/// Follows the deferred startup pattern:
/// 1. `new()` -- validates config and allocates the store
/// 2. `start()` -- binds TCP listener to the configured address
/// 3. `serve()` -- runs the sweeper (if enabled) and accepts connections
///    until shutdown is signalled
pub struct ScopeServer {
    config: ServerConfig,
    listener: Option<TcpListener>,
    store: Arc<RequestStore>,
}

impl ScopeServer {
    /// Creates a server with its own store sized by `config.store`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `config` fails validation.
    pub fn new(config: ServerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let store = RequestStore::with_shards(config.store.shard_count)
            .map_err(|_| ConfigError::InvalidShardCount)?;
        Self::with_store(config, Arc::new(store))
    }

    /// Creates a server over an existing store, such as
    /// [`RequestStore::global`]. `config.store.shard_count` is validated but
    /// otherwise unused.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `config` fails validation.
    pub fn with_store(
        config: ServerConfig,
        store: Arc<RequestStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            listener: None,
            store,
        })
    }

    /// Returns a shared reference to the attribute store.
    #[must_use]
    pub fn store(&self) -> Arc<RequestStore> {
        Arc::clone(&self.store)
    }

    /// Assembles the axum router with all routes and middleware.
    ///
    /// Routes:
    /// - `GET /health` -- health JSON including the registered request count
    /// - `GET /health/live` -- Kubernetes liveness probe
    /// - `GET /context` -- attributes attached by the identity middleware
    pub fn build_router(&self) -> Router {
        Self::router(&self.config, &self.store)
    }

    fn router(config: &ServerConfig, store: &Arc<RequestStore>) -> Router {
        let state = AppState::new(Arc::clone(store));
        let layers = build_http_layers(&config.network, Arc::clone(store));

        Router::new()
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/context", get(context_handler))
            .route_layer(from_fn(attach_identity))
            .layer(layers)
            .with_state(state)
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the actual bound port, which may differ from the configured
    /// port when port 0 is used (OS-assigned ephemeral port).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let network = &self.config.network;
        let addr = format!("{}:{}", network.host, network.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!("TCP listener bound to {}:{}", network.host, port);

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves connections until `shutdown` resolves, then stops the sweeper.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first, the sweeper
    /// configuration is invalid, the server encounters a fatal I/O error, or
    /// the sweeper task died while serving.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let Some(listener) = self.listener else {
            anyhow::bail!("start() must be called before serve()");
        };
        let router = Self::router(&self.config, &self.store);
        let mut sweeper = spawn_sweeper(Arc::clone(&self.store), &self.config.sweeper)?;

        info!(shards = self.store.shard_count(), "serving HTTP connections");
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await;

        let sweeper_result = match sweeper.as_mut() {
            Some(worker) => worker.stop().await,
            None => Ok(()),
        };
        info!(
            registered_requests = self.store.len(),
            "server stopped"
        );
        result?;
        sweeper_result
    }
}
