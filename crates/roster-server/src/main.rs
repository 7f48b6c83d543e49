//! roster-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, starts the daily promotion scheduler, and serves
//! the JSON API under `/api`.
//!
//! # Configuration
//!
//! ```toml
//! host = "127.0.0.1"
//! port = 8080
//! store_path = "~/.local/share/roster/roster.db"
//!
//! [promotion]
//! enabled = true
//! run_at = "02:00"
//! timezone = "Asia/Ho_Chi_Minh"
//! lookahead_hours = 24
//! ```
//!
//! Every key can be overridden from the environment, e.g. `ROSTER_PORT` or
//! `ROSTER_PROMOTION__RUN_AT`.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use axum::Router;
use clap::Parser;
use roster_core::event::ChangeEventSink;
use roster_server::{ServerConfig, TracingEventSink, expand_tilde, scheduler::PromotionScheduler};
use roster_store_sqlite::SqliteStore;
use tokio::{net::TcpListener, sync::watch};
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Roster enrollment timeline server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("ROSTER")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store.
  let store = Arc::new(
    SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?,
  );
  let events: Arc<dyn ChangeEventSink> = Arc::new(TracingEventSink);

  // Start the promotion scheduler.
  let (shutdown_tx, shutdown_rx) = watch::channel(false);
  let scheduler = if server_cfg.promotion.enabled {
    let scheduler = PromotionScheduler::new(
      Arc::clone(&store),
      Arc::clone(&events),
      &server_cfg.promotion,
      shutdown_rx,
    )
    .context("invalid promotion configuration")?;
    Some(tokio::spawn(scheduler.run()))
  } else {
    tracing::info!("promotion scheduler disabled");
    None
  };

  let app = Router::new()
    .nest("/api", roster_api::api_router(store, events))
    .layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  // Stop the scheduler once the server has drained.
  let _ = shutdown_tx.send(true);
  if let Some(handle) = scheduler {
    handle.await.context("promotion scheduler panicked")?;
  }

  Ok(())
}

async fn shutdown_signal() {
  if let Err(err) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %err, "failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutting down");
}
