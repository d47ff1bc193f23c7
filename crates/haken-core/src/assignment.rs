//! Assignments link a worker to a contract, optionally for a sub-range of the
//! contract's dates. Detaching is a soft operation: the row stays, with
//! `detached_at` set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, contract::DateRange};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
  pub assignment_id: Uuid,
  pub contract_id:   Uuid,
  pub worker_number: String,
  /// Per-assignment hourly rate, overriding the contract rate.
  pub rate_override: Option<u32>,
  /// When the worker joins or leaves mid-contract.
  pub sub_range:     Option<DateRange>,
  pub assigned_at:   DateTime<Utc>,
  pub detached_at:   Option<DateTime<Utc>>,
}

impl Assignment {
  pub fn is_live(&self) -> bool { self.detached_at.is_none() }

  /// The window the worker is actually placed for.
  pub fn effective_window(&self, contract_range: &DateRange) -> DateRange {
    self.sub_range.unwrap_or(*contract_range)
  }
}

/// Input to [`crate::engine::ContractEngine::attach_worker`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAssignment {
  pub worker_number: String,
  #[serde(default)]
  pub rate_override: Option<u32>,
  #[serde(default)]
  pub sub_range:     Option<DateRange>,
}

impl NewAssignment {
  pub fn new(worker_number: impl Into<String>) -> Self {
    Self {
      worker_number: worker_number.into(),
      rate_override: None,
      sub_range:     None,
    }
  }

  pub fn with_sub_range(mut self, window: DateRange) -> Self {
    self.sub_range = Some(window);
    self
  }
}

/// A sub-range must lie inside the parent contract's range.
pub fn check_within(window: &DateRange, contract: &DateRange) -> Result<()> {
  if contract.contains(window) {
    Ok(())
  } else {
    Err(Error::AssignmentOutOfRange {
      window:   *window,
      contract: *contract,
    })
  }
}
