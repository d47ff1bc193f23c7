//! Outbound notifications via a transactional outbox.
//!
//! Lifecycle transitions insert a [`NotificationEvent`] row in the same
//! transaction as the status change. The [`OutboxRelay`] drains due rows and
//! hands them to a [`NotificationSink`], independently of the transaction
//! that produced them. Delivery is at-least-once: a sink may see an event
//! again if marking it delivered fails after a successful send.

use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, store::ContractStore};

// ─── Event ───────────────────────────────────────────────────────────────────

/// What the notification collaborator receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
  pub event_id:    Uuid,
  /// e.g. `contract.approved`.
  pub event_name:  String,
  pub contract_id: Uuid,
  pub occurred_at: DateTime<Utc>,
  pub payload:     serde_json::Value,
}

impl NotificationEvent {
  pub fn new(
    event_name: impl Into<String>,
    contract_id: Uuid,
    occurred_at: DateTime<Utc>,
    payload: serde_json::Value,
  ) -> Self {
    Self {
      event_id: Uuid::new_v4(),
      event_name: event_name.into(),
      contract_id,
      occurred_at,
      payload,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
  Pending,
  Delivered,
  /// Gave up after `max_attempts`; needs operator attention.
  DeadLettered,
}

impl DeliveryState {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Delivered => "delivered",
      Self::DeadLettered => "dead_lettered",
    }
  }
}

impl std::str::FromStr for DeliveryState {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "pending" => Ok(Self::Pending),
      "delivered" => Ok(Self::Delivered),
      "dead_lettered" => Ok(Self::DeadLettered),
      other => Err(Error::UnknownVariant {
        kind:  "delivery state",
        value: other.to_owned(),
      }),
    }
  }
}

/// An outbox row: the event plus its delivery bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
  pub event:           NotificationEvent,
  pub state:           DeliveryState,
  pub attempts:        u32,
  pub next_attempt_at: DateTime<Utc>,
  pub last_error:      Option<String>,
  pub delivered_at:    Option<DateTime<Utc>>,
}

// ─── Backoff ─────────────────────────────────────────────────────────────────

/// Bounded exponential backoff for redelivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
  pub initial_delay_secs: u64,
  pub max_delay_secs:     u64,
  /// Attempts after which an entry is dead-lettered.
  pub max_attempts:       u32,
}

impl Default for BackoffPolicy {
  fn default() -> Self {
    Self {
      initial_delay_secs: 30,
      max_delay_secs:     3600,
      max_attempts:       10,
    }
  }
}

impl BackoffPolicy {
  /// Delay before the next attempt, given how many attempts have failed.
  pub fn delay_after(&self, failed_attempts: u32) -> Duration {
    let exp = failed_attempts.saturating_sub(1).min(32);
    let secs = self
      .initial_delay_secs
      .saturating_mul(1u64 << exp)
      .min(self.max_delay_secs);
    Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))
  }

  pub fn exhausted(&self, failed_attempts: u32) -> bool {
    failed_attempts >= self.max_attempts
  }
}

// ─── Sink ────────────────────────────────────────────────────────────────────

/// The external notification collaborator.
pub trait NotificationSink: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn deliver<'a>(
    &'a self,
    event: &'a NotificationEvent,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

// ─── Relay ───────────────────────────────────────────────────────────────────

/// Counts from one [`OutboxRelay::drain_once`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
  pub delivered:     usize,
  pub retried:       usize,
  pub dead_lettered: usize,
}

/// Drains the outbox into a sink.
pub struct OutboxRelay<S, N> {
  store:      S,
  sink:       N,
  backoff:    BackoffPolicy,
  batch_size: usize,
}

impl<S, N> OutboxRelay<S, N>
where
  S: ContractStore,
  N: NotificationSink,
{
  pub fn new(store: S, sink: N, backoff: BackoffPolicy, batch_size: usize) -> Self {
    Self { store, sink, backoff, batch_size: batch_size.max(1) }
  }

  /// Attempt delivery of every entry due at `now`, up to the batch size.
  pub async fn drain_once(&self, now: DateTime<Utc>) -> Result<DrainReport> {
    let due = self
      .store
      .due_notifications(now, self.batch_size)
      .await
      .map_err(Error::store)?;

    let mut report = DrainReport::default();
    for entry in due {
      let event = &entry.event;
      match self.sink.deliver(event).await {
        Ok(()) => {
          self
            .store
            .mark_delivered(event.event_id, now)
            .await
            .map_err(Error::store)?;
          tracing::debug!(event = %event.event_name, id = %event.event_id, "notification delivered");
          report.delivered += 1;
        }
        Err(e) => {
          let attempts = entry.attempts + 1;
          if self.backoff.exhausted(attempts) {
            tracing::error!(
              event = %event.event_name,
              id = %event.event_id,
              attempts,
              error = %e,
              "notification dead-lettered"
            );
            self
              .store
              .dead_letter(event.event_id, attempts, e.to_string())
              .await
              .map_err(Error::store)?;
            report.dead_lettered += 1;
          } else {
            let next = now + self.backoff.delay_after(attempts);
            tracing::warn!(
              event = %event.event_name,
              id = %event.event_id,
              attempts,
              next_attempt_at = %next,
              error = %e,
              "notification delivery failed; will retry"
            );
            self
              .store
              .schedule_retry(event.event_id, attempts, next, e.to_string())
              .await
              .map_err(Error::store)?;
            report.retried += 1;
          }
        }
      }
    }

    Ok(report)
  }
}
