//! Notification sinks the daemon can drain the outbox into.

use std::time::Duration;

use haken_core::notify::{NotificationEvent, NotificationSink};
use reqwest::Client;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
  #[error("webhook request failed: {0}")]
  Http(#[from] reqwest::Error),
}

/// POSTs each event as JSON to a fixed URL. Any non-2xx response is a
/// failed delivery.
#[derive(Clone)]
pub struct WebhookSink {
  client: Client,
  url:    String,
}

impl WebhookSink {
  pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SinkError> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self { client, url: url.into() })
  }
}

impl NotificationSink for WebhookSink {
  type Error = SinkError;

  async fn deliver<'a>(&'a self, event: &'a NotificationEvent) -> Result<(), SinkError> {
    self
      .client
      .post(&self.url)
      .header("X-Haken-Event", &event.event_name)
      .header("X-Haken-Event-Id", event.event_id.to_string())
      .json(event)
      .send()
      .await?
      .error_for_status()?;
    Ok(())
  }
}

/// Writes each event to the log. Used when no webhook is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
  type Error = SinkError;

  async fn deliver<'a>(&'a self, event: &'a NotificationEvent) -> Result<(), SinkError> {
    tracing::info!(
      event = %event.event_name,
      id = %event.event_id,
      contract = %event.contract_id,
      payload = %event.payload,
      "notification"
    );
    Ok(())
  }
}

/// The sink selected by configuration.
#[derive(Clone)]
pub enum Sink {
  Webhook(WebhookSink),
  Log(LogSink),
}

impl NotificationSink for Sink {
  type Error = SinkError;

  async fn deliver<'a>(&'a self, event: &'a NotificationEvent) -> Result<(), SinkError> {
    match self {
      Self::Webhook(s) => s.deliver(event).await,
      Self::Log(s) => s.deliver(event).await,
    }
  }
}
