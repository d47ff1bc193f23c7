//! Conflict-date compliance checks.
//!
//! [`validate`] is pure: identical inputs always produce identical reports.
//! It runs when a contract is created or edited, and again right before
//! approval and activation, because the site's conflict date may have moved
//! since the draft was written.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{Error, Result, config::CompliancePolicy, site::ClientSite};

/// How urgently an approaching conflict date should be surfaced.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Notice,
  Critical,
}

/// Non-blocking findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComplianceWarning {
  ApproachingConflictDate {
    conflict_date:  NaiveDate,
    days_remaining: i64,
    severity:       Severity,
  },
}

/// Hard findings. A contract carrying one may be saved as a draft but can
/// never become active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComplianceViolation {
  ConflictDateExceeded {
    end:           NaiveDate,
    conflict_date: NaiveDate,
  },
}

impl From<ComplianceViolation> for Error {
  fn from(v: ComplianceViolation) -> Self {
    match v {
      ComplianceViolation::ConflictDateExceeded { end, conflict_date } => {
        Error::ConflictDateExceeded { end, conflict_date }
      }
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceReport {
  pub warnings:  Vec<ComplianceWarning>,
  pub violation: Option<ComplianceViolation>,
}

impl ComplianceReport {
  pub fn is_ok(&self) -> bool { self.violation.is_none() }

  /// The most severe warning tier present, if any.
  pub fn max_severity(&self) -> Option<Severity> {
    self
      .warnings
      .iter()
      .map(|w| match w {
        ComplianceWarning::ApproachingConflictDate { severity, .. } => *severity,
      })
      .max()
  }

  /// Turn a hard violation into an error, keeping the warnings otherwise.
  pub fn into_result(self) -> Result<Vec<ComplianceWarning>> {
    match self.violation {
      Some(v) => Err(v.into()),
      None => Ok(self.warnings),
    }
  }
}

/// Check `[start, end]` against `site`'s conflict date.
///
/// Returns [`Error::InvalidRange`] when `start > end`; every other finding is
/// carried in the report.
pub fn validate(
  site: &ClientSite,
  start: NaiveDate,
  end: NaiveDate,
  policy: &CompliancePolicy,
) -> Result<ComplianceReport> {
  if start > end {
    return Err(Error::InvalidRange { start, end });
  }

  let mut report = ComplianceReport::default();
  let Some(conflict_date) = site.conflict_date else {
    return Ok(report);
  };

  if end > conflict_date {
    report.violation =
      Some(ComplianceViolation::ConflictDateExceeded { end, conflict_date });
    return Ok(report);
  }

  let days_remaining = (conflict_date - end).num_days();
  let severity = if days_remaining <= policy.critical_window_days {
    Some(Severity::Critical)
  } else if days_remaining <= policy.notice_window_days {
    Some(Severity::Notice)
  } else {
    None
  };

  if let Some(severity) = severity {
    report.warnings.push(ComplianceWarning::ApproachingConflictDate {
      conflict_date,
      days_remaining,
      severity,
    });
  }

  Ok(report)
}
