//! Policy and configuration values passed explicitly into the engine.
//!
//! Nothing here is read from ambient global state; callers deserialise these
//! from their own configuration source and hand them over at construction or
//! call time.

use serde::{Deserialize, Serialize};

use crate::{Error, Result, number::validate_prefix};

/// Thresholds for compliance warnings and assignment advisories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompliancePolicy {
  /// Days before the conflict date at which a warning becomes critical.
  pub critical_window_days: i64,
  /// Days before the conflict date at which a notice is first raised.
  pub notice_window_days:   i64,
  /// Fractional rate difference (0.10 = 10%) above which an advisory is
  /// tagged `RateDeltaSignificant`.
  pub rate_delta_threshold: f64,
}

impl CompliancePolicy {
  /// The critical window must sit inside the notice window, or notices would
  /// never be raised.
  pub fn validate(&self) -> Result<()> {
    if self.critical_window_days < 0 {
      return Err(Error::InvalidPolicy("critical_window_days is negative"));
    }
    if self.notice_window_days < self.critical_window_days {
      return Err(Error::InvalidPolicy(
        "notice_window_days is shorter than critical_window_days",
      ));
    }
    if !(self.rate_delta_threshold.is_finite() && self.rate_delta_threshold >= 0.0) {
      return Err(Error::InvalidPolicy(
        "rate_delta_threshold must be a non-negative number",
      ));
    }
    Ok(())
  }
}

impl Default for CompliancePolicy {
  fn default() -> Self {
    Self {
      critical_window_days: 30,
      notice_window_days:   90,
      rate_delta_threshold: 0.10,
    }
  }
}

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
  /// Deployment-level prefix of every contract number, e.g. `KOB`.
  pub contract_prefix: String,
  #[serde(default)]
  pub policy:          CompliancePolicy,
}

impl EngineConfig {
  pub fn new(contract_prefix: impl Into<String>) -> Result<Self> {
    let config = Self {
      contract_prefix: contract_prefix.into(),
      policy:          CompliancePolicy::default(),
    };
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<()> {
    validate_prefix(&self.contract_prefix)?;
    self.policy.validate()
  }
}

/// Staffing-company details handed to the document collaborator alongside a
/// contract snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
  pub name:             String,
  pub address:          String,
  pub phone:            String,
  /// Dispatch business licence number printed on contract documents.
  pub license_number:   String,
  pub responsible_name: String,
}
