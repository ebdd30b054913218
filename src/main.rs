mod api;
mod app;
mod cache;
mod config;
mod error;
mod event;
mod sync;
mod ui;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "queue-sync")]
#[command(about = "A terminal dashboard for a categorized request queue")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/queue-sync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Fetch the queue for this user instead of the configured one
  #[arg(short, long)]
  user: Option<String>,
}

/// Log to a daily file; the terminal belongs to the dashboard.
///
/// Filtering follows `QUEUE_SYNC_LOG` (default `info`).
fn init_logging() -> Result<WorkerGuard> {
  let dir = dirs::data_dir()
    .ok_or_else(|| eyre!("Could not determine the data directory"))?
    .join("queue-sync");
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(&dir, "queue-sync.log"));
  let env_filter = EnvFilter::try_from_env("QUEUE_SYNC_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::registry()
    .with(env_filter)
    .with(fmt::layer().with_writer(writer).with_ansi(false))
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = init_logging()?;

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;

  // Override user if specified on command line
  if let Some(user) = args.user {
    config.api.user_id = user;
  }

  tracing::info!(user_id = %config.api.user_id, api = %config.api.url, "starting");

  // Initialize and run the app
  let mut app = app::App::new(config)?;
  app.run().await?;

  Ok(())
}
