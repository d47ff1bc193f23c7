//! Contract types, the central entity of the engine.
//!
//! A contract's `lifecycle_status` is never written directly. It changes only
//! through [`crate::lifecycle::Transition`]s applied by the engine, which the
//! store persists with an optimistic-concurrency guard on `version`.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, number::{ContractNumber, YearMonth}};

// ─── DateRange ───────────────────────────────────────────────────────────────

/// An inclusive calendar-date range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
  pub start: NaiveDate,
  pub end:   NaiveDate,
}

impl DateRange {
  /// Build a range, rejecting `start > end` with [`Error::InvalidRange`].
  pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
    if start > end {
      return Err(Error::InvalidRange { start, end });
    }
    Ok(Self { start, end })
  }

  /// Both ranges share at least one day.
  pub fn overlaps(&self, other: &DateRange) -> bool {
    self.start <= other.end && other.start <= self.end
  }

  /// The ranges are disjoint but adjacent with no gap day between them.
  pub fn abuts(&self, other: &DateRange) -> bool {
    self.end.checked_add_days(Days::new(1)) == Some(other.start)
      || other.end.checked_add_days(Days::new(1)) == Some(self.start)
  }

  pub fn contains(&self, other: &DateRange) -> bool {
    self.start <= other.start && other.end <= self.end
  }

  /// Number of calendar days covered, counting both ends.
  pub fn len_days(&self) -> i64 { (self.end - self.start).num_days() + 1 }
}

impl fmt::Display for DateRange {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[{}, {}]", self.start, self.end)
  }
}

// ─── Statuses ────────────────────────────────────────────────────────────────

/// The approval gate inside the workflow.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
  #[default]
  Pending,
  Approved,
  Rejected,
}

impl ApprovalStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Approved => "approved",
      Self::Rejected => "rejected",
    }
  }
}

impl FromStr for ApprovalStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "pending" => Ok(Self::Pending),
      "approved" => Ok(Self::Approved),
      "rejected" => Ok(Self::Rejected),
      other => Err(Error::UnknownVariant {
        kind:  "approval status",
        value: other.to_owned(),
      }),
    }
  }
}

impl fmt::Display for ApprovalStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// The authoritative workflow state of a contract.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
  #[default]
  Draft,
  PendingReview,
  PendingApproval,
  Approved,
  Active,
  Expired,
  Cancelled,
  Renewed,
}

impl LifecycleStatus {
  pub const ALL: [LifecycleStatus; 8] = [
    Self::Draft,
    Self::PendingReview,
    Self::PendingApproval,
    Self::Approved,
    Self::Active,
    Self::Expired,
    Self::Cancelled,
    Self::Renewed,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Draft => "draft",
      Self::PendingReview => "pending_review",
      Self::PendingApproval => "pending_approval",
      Self::Approved => "approved",
      Self::Active => "active",
      Self::Expired => "expired",
      Self::Cancelled => "cancelled",
      Self::Renewed => "renewed",
    }
  }

  /// No further transition is possible from this status.
  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Expired | Self::Cancelled | Self::Renewed)
  }

  /// Contracts in these states can take on more workers.
  pub fn is_placeable(&self) -> bool {
    matches!(self, Self::Approved | Self::Active)
  }
}

impl FromStr for LifecycleStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    Self::ALL
      .into_iter()
      .find(|status| status.as_str() == s)
      .ok_or_else(|| Error::UnknownVariant {
        kind:  "lifecycle status",
        value: s.to_owned(),
      })
  }
}

impl fmt::Display for LifecycleStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Contract ────────────────────────────────────────────────────────────────

/// An individually negotiated dispatch contract with one client site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
  pub contract_id:      Uuid,
  /// Immutable once assigned.
  pub contract_number:  ContractNumber,
  pub site_id:          Uuid,
  pub range:            DateRange,
  pub work_description: String,
  /// Hourly rate billed to the client, in yen.
  pub hourly_rate:      u32,
  pub approval_status:  ApprovalStatus,
  pub lifecycle_status: LifecycleStatus,
  pub approver:         Option<String>,
  /// Set when the contract was spawned by renewing another one.
  pub renewed_from:     Option<Uuid>,
  /// Reason recorded by the last send-back or rejection.
  pub rejection_reason: Option<String>,
  /// Optimistic-concurrency token; incremented by every write.
  pub version:          i64,
  pub created_at:       DateTime<Utc>,
  pub updated_at:       DateTime<Utc>,
}

impl Contract {
  pub fn period(&self) -> YearMonth { self.contract_number.period }
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Input to [`crate::engine::ContractEngine::create_contract`].
/// The number, statuses and timestamps are always set by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewContract {
  pub site_id:          Uuid,
  pub start:            NaiveDate,
  pub end:              NaiveDate,
  pub work_description: String,
  pub hourly_rate:      u32,
  #[serde(default)]
  pub approver:         Option<String>,
}

/// Editable fields of a draft. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractPatch {
  pub start:            Option<NaiveDate>,
  pub end:              Option<NaiveDate>,
  pub work_description: Option<String>,
  pub hourly_rate:      Option<u32>,
}

impl ContractPatch {
  pub fn is_empty(&self) -> bool {
    self.start.is_none()
      && self.end.is_none()
      && self.work_description.is_none()
      && self.hourly_rate.is_none()
  }

  /// Apply to a copy of `contract`, validating the resulting range.
  pub fn apply_to(&self, contract: &Contract) -> Result<Contract> {
    let mut next = contract.clone();
    next.range = DateRange::new(
      self.start.unwrap_or(contract.range.start),
      self.end.unwrap_or(contract.range.end),
    )?;
    if let Some(desc) = &self.work_description {
      next.work_description = desc.clone();
    }
    if let Some(rate) = self.hourly_rate {
      next.hourly_rate = rate;
    }
    Ok(next)
  }
}
