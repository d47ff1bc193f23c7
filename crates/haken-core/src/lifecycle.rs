//! The contract lifecycle state machine.
//!
//! The transition table in [`target`] is closed: any `(status, transition)`
//! pair it does not list is rejected with [`Error::InvalidTransition`].
//! [`plan`] combines the table with the guards that need nothing beyond the
//! contract itself (reasons, approver, dates); the engine adds the compliance
//! re-check, which needs the client site.

use std::fmt;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  contract::{ApprovalStatus, Contract, DateRange, LifecycleStatus},
};

// ─── Transitions ─────────────────────────────────────────────────────────────

/// Overrides for the successor draft spawned by a renewal. Unset fields are
/// pre-populated from the parent contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenewalTerms {
  pub start:            Option<NaiveDate>,
  pub end:              Option<NaiveDate>,
  pub hourly_rate:      Option<u32>,
  pub work_description: Option<String>,
}

impl RenewalTerms {
  /// The successor range: by default it starts the day after the parent ends
  /// and runs for the same number of days.
  pub fn successor_range(&self, parent: &DateRange) -> Result<DateRange> {
    let start = match self.start {
      Some(start) => start,
      None => parent
        .end
        .checked_add_days(Days::new(1))
        .ok_or(Error::InvalidRange { start: parent.end, end: parent.end })?,
    };
    let end = match self.end {
      Some(end) => end,
      None => start
        .checked_add_days(Days::new((parent.len_days() - 1) as u64))
        .ok_or(Error::InvalidRange { start, end: start })?,
    };
    DateRange::new(start, end)
  }
}

/// A requested lifecycle change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
  Submit,
  SendBack { reason: String },
  Approve,
  Reject { reason: String },
  Activate,
  Expire,
  Renew(RenewalTerms),
  Cancel { reason: String },
}

/// The payload-free discriminant of a [`Transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionKind {
  Submit,
  SendBack,
  Approve,
  Reject,
  Activate,
  Expire,
  Renew,
  Cancel,
}

impl TransitionKind {
  pub const ALL: [TransitionKind; 8] = [
    Self::Submit,
    Self::SendBack,
    Self::Approve,
    Self::Reject,
    Self::Activate,
    Self::Expire,
    Self::Renew,
    Self::Cancel,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Submit => "submit",
      Self::SendBack => "send_back",
      Self::Approve => "approve",
      Self::Reject => "reject",
      Self::Activate => "activate",
      Self::Expire => "expire",
      Self::Renew => "renew",
      Self::Cancel => "cancel",
    }
  }
}

impl fmt::Display for TransitionKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl Transition {
  pub fn kind(&self) -> TransitionKind {
    match self {
      Self::Submit => TransitionKind::Submit,
      Self::SendBack { .. } => TransitionKind::SendBack,
      Self::Approve => TransitionKind::Approve,
      Self::Reject { .. } => TransitionKind::Reject,
      Self::Activate => TransitionKind::Activate,
      Self::Expire => TransitionKind::Expire,
      Self::Renew(_) => TransitionKind::Renew,
      Self::Cancel { .. } => TransitionKind::Cancel,
    }
  }

  fn reason(&self) -> Option<&str> {
    match self {
      Self::SendBack { reason }
      | Self::Reject { reason }
      | Self::Cancel { reason } => Some(reason.as_str()),
      _ => None,
    }
  }
}

// ─── Table ───────────────────────────────────────────────────────────────────

/// The closed transition table.
pub fn target(
  from: LifecycleStatus,
  kind: TransitionKind,
) -> Option<LifecycleStatus> {
  use LifecycleStatus as S;
  use TransitionKind as T;

  match (from, kind) {
    (S::Draft, T::Submit) => Some(S::PendingReview),
    (S::PendingReview, T::Submit) => Some(S::PendingApproval),
    (S::PendingReview, T::SendBack) => Some(S::Draft),
    (S::PendingApproval, T::Approve) => Some(S::Approved),
    (S::PendingApproval, T::Reject) => Some(S::Draft),
    (S::Approved, T::Activate) => Some(S::Active),
    (S::Active, T::Expire) => Some(S::Expired),
    (S::Active, T::Renew) => Some(S::Renewed),
    (
      S::Draft | S::PendingReview | S::PendingApproval | S::Active,
      T::Cancel,
    ) => Some(S::Cancelled),
    _ => None,
  }
}

// ─── Planning ────────────────────────────────────────────────────────────────

/// The validated effect of a transition on one contract.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
  pub kind:             TransitionKind,
  pub from:             LifecycleStatus,
  pub to:               LifecycleStatus,
  pub approval_status:  ApprovalStatus,
  /// New value for `rejection_reason`, when the transition sets one.
  pub rejection_reason: Option<String>,
  /// Reason recorded in the audit entry.
  pub reason:           Option<String>,
  /// The site's conflict date must be re-checked before committing.
  pub needs_compliance: bool,
}

impl Step {
  /// Outbox event name for this step, e.g. `contract.approved`.
  pub fn event_name(&self) -> String { format!("contract.{}", self.to) }
}

/// Check `transition` against `contract`'s current state and the contract-local
/// guards.
pub fn plan(
  contract: &Contract,
  transition: &Transition,
  today: NaiveDate,
) -> Result<Step> {
  let kind = transition.kind();
  let from = contract.lifecycle_status;
  let to = target(from, kind).ok_or(Error::InvalidTransition {
    from,
    transition: kind.as_str(),
  })?;

  let reason = match transition.reason() {
    Some(r) if r.trim().is_empty() => {
      return Err(Error::ReasonRequired(kind.as_str()));
    }
    Some(r) => Some(r.trim().to_owned()),
    None => None,
  };

  let mut approval_status = contract.approval_status;
  let mut rejection_reason = None;

  match kind {
    TransitionKind::Submit if from == LifecycleStatus::Draft => {
      approval_status = ApprovalStatus::Pending;
    }
    TransitionKind::SendBack => {
      rejection_reason = reason.clone();
    }
    TransitionKind::Approve => {
      if contract
        .approver
        .as_deref()
        .is_none_or(|a| a.trim().is_empty())
      {
        return Err(Error::ApproverRequired(contract.contract_id));
      }
      approval_status = ApprovalStatus::Approved;
    }
    TransitionKind::Reject => {
      approval_status = ApprovalStatus::Rejected;
      rejection_reason = reason.clone();
    }
    TransitionKind::Activate => {
      if contract.range.start > today {
        return Err(Error::NotYetStarted {
          contract_id: contract.contract_id,
          start:       contract.range.start,
        });
      }
    }
    TransitionKind::Expire => {
      if contract.range.end >= today {
        return Err(Error::NotYetEnded {
          contract_id: contract.contract_id,
          end:         contract.range.end,
        });
      }
    }
    _ => {}
  }

  Ok(Step {
    kind,
    from,
    to,
    approval_status,
    rejection_reason,
    reason,
    needs_compliance: matches!(
      kind,
      TransitionKind::Approve | TransitionKind::Activate
    ),
  })
}
