//! The `hakend` background worker.
//!
//! Each tick runs the engine's scheduled transitions (activation on the start
//! date, expiry after the end date) and then drains the notification outbox.

pub mod config;
pub mod sink;

use std::time::Duration;

use chrono::{DateTime, Utc};
use haken_core::{
  ContractEngine, Result, SweepReport,
  notify::{DrainReport, NotificationSink, OutboxRelay},
  store::ContractStore,
};

pub use config::DaemonConfig;

pub struct Daemon<S, N> {
  engine: ContractEngine<S>,
  relay:  OutboxRelay<S, N>,
  tick:   Duration,
}

impl<S, N> Daemon<S, N>
where
  S: ContractStore,
  N: NotificationSink,
{
  pub fn new(engine: ContractEngine<S>, relay: OutboxRelay<S, N>, tick: Duration) -> Self {
    Self { engine, relay, tick }
  }

  /// One scheduler pass followed by one outbox drain.
  pub async fn tick(&self, now: DateTime<Utc>) -> Result<(SweepReport, DrainReport)> {
    let sweep = self.engine.run_scheduled().await?;
    let drain = self.relay.drain_once(now).await?;
    if drain != DrainReport::default() {
      tracing::info!(
        delivered = drain.delivered,
        retried = drain.retried,
        dead_lettered = drain.dead_lettered,
        "outbox drained"
      );
    }
    Ok((sweep, drain))
  }

  /// Tick until `shutdown` resolves. A failed tick is logged and retried on
  /// the next interval.
  pub async fn run(&self, shutdown: impl Future<Output = ()>) {
    let mut interval = tokio::time::interval(self.tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
      tokio::select! {
        _ = &mut shutdown => {
          tracing::info!("shutting down");
          return;
        }
        _ = interval.tick() => {
          if let Err(e) = self.tick(Utc::now()).await {
            tracing::error!(error = %e, retryable = e.is_retryable(), "tick failed");
          }
        }
      }
    }
  }
}
