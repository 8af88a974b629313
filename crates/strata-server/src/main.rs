//! StrataDB standalone server.

mod api;
mod downstream;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use strata_frontend::SplitByDay;
use strata_ingester::{Ingester, WalConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::AppState;
use crate::downstream::HttpQueryExecutor;

/// StrataDB - horizontally scalable time-series ingestion and query platform
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bind address for the HTTP API
    #[arg(long, default_value = "127.0.0.1:9009")]
    listen: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable the write-ahead log
    #[arg(long)]
    wal_enabled: bool,

    /// Recover from the write-ahead log on startup
    #[arg(long)]
    wal_recover: bool,

    /// Directory to store the write-ahead log
    #[arg(long, default_value = "wal")]
    wal_dir: PathBuf,

    /// Duration over which to spread one checkpoint pass, in seconds
    #[arg(long, default_value_t = 3600)]
    checkpoint_duration_secs: u64,

    /// Base URL of the downstream query engine; when unset, range queries
    /// return 503
    #[arg(long)]
    downstream_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("stratadb={}", args.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting StrataDB server");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let wal_config = WalConfig {
        enabled: args.wal_enabled,
        recover: args.wal_recover,
        dir: args.wal_dir,
        checkpoint_duration: Duration::from_secs(args.checkpoint_duration_secs),
        ..WalConfig::default()
    };
    let ingester = Arc::new(Ingester::open(wal_config)?);

    let query_frontend = args
        .downstream_url
        .as_deref()
        .map(|url| Arc::new(SplitByDay::new(Arc::new(HttpQueryExecutor::new(url)))));
    if let Some(url) = &args.downstream_url {
        info!(downstream = %url, "query-range frontend enabled");
    }

    let state = AppState {
        ingester: Arc::clone(&ingester),
        query_frontend,
    };

    let app = Router::new()
        .route("/api/v1/push", post(api::push))
        .route("/api/v1/query_range", get(api::query_range))
        .route("/healthz", get(api::healthz))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    info!(listen = %args.listen, "HTTP API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    // Stop the WAL last: flushes the checkpointer and closes both logs.
    ingester.shutdown();
    info!("shutdown complete");
    Ok(())
}
