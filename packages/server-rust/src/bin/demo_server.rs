//! Demo HTTP server exposing `/health`, `/health/live`, and `/context`.
//!
//! ```text
//! reqscope-demo --port 8080 --sweeper --sweep-max-age-secs 120
//! curl -H 'x-user: alice' -H 'x-role: admin' localhost:8080/context
//! ```

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use reqscope_server::{NetworkConfig, ScopeServer, ServerConfig, StoreConfig, SweeperConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bind address
    #[arg(long, env = "REQSCOPE_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Listen port (0 picks a free port)
    #[arg(long, env = "REQSCOPE_PORT", default_value_t = 8080)]
    port: u16,

    /// Number of store shards
    #[arg(long, env = "REQSCOPE_SHARDS", default_value_t = reqscope_core::DEFAULT_SHARD_COUNT)]
    shards: usize,

    /// Request timeout in seconds
    #[arg(long, env = "REQSCOPE_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,

    /// Allowed CORS origins, comma separated
    #[arg(long, env = "REQSCOPE_CORS_ORIGINS", value_delimiter = ',', default_value = "*")]
    cors_origins: Vec<String>,

    /// Enable the stale attribute sweeper
    #[arg(long, env = "REQSCOPE_SWEEPER")]
    sweeper: bool,

    /// Seconds between sweeps
    #[arg(long, env = "REQSCOPE_SWEEP_INTERVAL_SECS", default_value_t = 60)]
    sweep_interval_secs: u64,

    /// Age in seconds after which an uncleared request is purged
    #[arg(long, env = "REQSCOPE_SWEEP_MAX_AGE_SECS", default_value_t = 300)]
    sweep_max_age_secs: i64,

    /// Emit logs as JSON
    #[arg(long, env = "REQSCOPE_LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            network: NetworkConfig {
                host: self.host,
                port: self.port,
                cors_origins: self.cors_origins,
                request_timeout: Duration::from_secs(self.request_timeout_secs),
            },
            store: StoreConfig {
                shard_count: self.shards,
            },
            sweeper: SweeperConfig {
                enabled: self.sweeper,
                interval: Duration::from_secs(self.sweep_interval_secs),
                max_age_secs: self.sweep_max_age_secs,
            },
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let mut server = ScopeServer::new(args.into_config())?;
    server.start().await?;
    server.serve(shutdown_signal()).await
}
