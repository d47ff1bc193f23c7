//! `hakend`: runs scheduled contract transitions and delivers queued
//! notifications.
//!
//! Reads `hakend.toml` (or the path given with `--config`) plus `HAKEN_*`
//! environment variables, opens the SQLite store and ticks until interrupted.

use std::{path::PathBuf, time::Duration};

use anyhow::Context as _;
use clap::Parser;
use haken_core::{ContractEngine, notify::OutboxRelay};
use haken_daemon::{
  Daemon, DaemonConfig,
  sink::{LogSink, Sink, WebhookSink},
};
use haken_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Haken contract lifecycle daemon")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "hakend.toml")]
  config: PathBuf,

  /// Run a single tick and exit.
  #[arg(long)]
  once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let cfg = DaemonConfig::load(&cli.config).context("failed to read configuration")?;

  let store = SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;

  let sink = match &cfg.webhook_url {
    Some(url) => {
      tracing::info!(%url, "delivering notifications to webhook");
      Sink::Webhook(
        WebhookSink::new(url, Duration::from_secs(cfg.outbox.request_timeout_secs))
          .context("failed to build HTTP client")?,
      )
    }
    None => {
      tracing::info!("no webhook configured; notifications are logged only");
      Sink::Log(LogSink)
    }
  };

  let engine = ContractEngine::new(store.clone(), cfg.engine.clone())
    .context("invalid engine configuration")?;
  let relay = OutboxRelay::new(
    store,
    sink,
    cfg.outbox.backoff.clone(),
    cfg.outbox.batch_size,
  );
  let daemon = Daemon::new(
    engine,
    relay,
    Duration::from_secs(cfg.tick_interval_secs.max(1)),
  );

  if cli.once {
    let (sweep, drain) = daemon.tick(chrono::Utc::now()).await?;
    tracing::info!(?sweep, ?drain, "tick complete");
    return Ok(());
  }

  tracing::info!(
    prefix = %cfg.engine.contract_prefix,
    interval_secs = cfg.tick_interval_secs,
    "hakend started"
  );
  daemon
    .run(async {
      if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
      }
    })
    .await;

  Ok(())
}
