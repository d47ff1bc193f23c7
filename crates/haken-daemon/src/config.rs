//! Daemon configuration: a TOML file overlaid with `HAKEN_*` environment
//! variables. Nested keys use `__`, e.g. `HAKEN_ENGINE__CONTRACT_PREFIX`.

use std::path::{Path, PathBuf};

use haken_core::{config::EngineConfig, notify::BackoffPolicy};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
  pub store_path:         PathBuf,
  pub engine:             EngineConfig,
  /// Seconds between scheduler/relay passes.
  #[serde(default = "default_tick_interval")]
  pub tick_interval_secs: u64,
  /// Deliver notifications by POSTing JSON here. Logged only when unset.
  #[serde(default)]
  pub webhook_url:        Option<String>,
  #[serde(default)]
  pub outbox:             OutboxConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutboxConfig {
  pub batch_size:           usize,
  pub request_timeout_secs: u64,
  pub backoff:              BackoffPolicy,
}

impl Default for OutboxConfig {
  fn default() -> Self {
    Self {
      batch_size:           50,
      request_timeout_secs: 30,
      backoff:              BackoffPolicy::default(),
    }
  }
}

fn default_tick_interval() -> u64 { 60 }

impl DaemonConfig {
  /// Read `path` (optional) and the environment.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    Self::from_builder(
      config::Config::builder()
        .add_source(config::File::from(path).required(false)),
    )
  }

  fn from_builder(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
  ) -> Result<Self, config::ConfigError> {
    let mut cfg: Self = builder
      .add_source(
        config::Environment::with_prefix("HAKEN")
          .prefix_separator("_")
          .separator("__"),
      )
      .build()?
      .try_deserialize()?;
    cfg.store_path = expand_tilde(&cfg.store_path);
    Ok(cfg)
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
